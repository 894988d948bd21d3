use std::fmt;
use std::io::Write;
use std::str::FromStr;

use dbridge_api::{Header, Record};

use crate::error::EngineError;

/// How query results are rendered for a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Header line, then each record's display text.
    #[default]
    Text,
    /// One JSON array of interchange values.
    Json,
    /// One interchange value per line.
    JsonLines,
}

impl FromStr for OutputFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "json-lines" | "jsonlines" => Ok(OutputFormat::JsonLines),
            other => Err(EngineError::Config(format!(
                "unknown output format '{other}' (expected text, json or jsonl)"
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::JsonLines => "jsonl",
        })
    }
}

/// Write `records` to `writer` in `format`. Returns the number of records written.
///
/// Stops at the first failing record; what was written before it stays written.
/// The `Json` array is still closed, so the partial output parses.
pub fn write_records<I, W>(
    format: OutputFormat,
    header: &Header,
    records: I,
    writer: &mut W,
) -> Result<usize, EngineError>
where
    I: IntoIterator<Item = dbridge_api::Result<Box<dyn Record>>>,
    W: Write,
{
    let mut count = 0;
    match format {
        OutputFormat::Text => {
            if !header.is_empty() {
                writeln!(writer, "{}", header.names().join("\t"))?;
            }
            for record in records {
                writeln!(writer, "{}", record?.display())?;
                count += 1;
            }
        }
        OutputFormat::Json => {
            writer.write_all(b"[")?;
            let outcome = write_array_items(records, writer, &mut count);
            writer.write_all(b"]\n")?;
            outcome?;
        }
        OutputFormat::JsonLines => {
            for record in records {
                writer.write_all(&record?.to_interchange()?)?;
                writer.write_all(b"\n")?;
                count += 1;
            }
        }
    }
    writer.flush()?;
    Ok(count)
}

fn write_array_items<I, W>(records: I, writer: &mut W, count: &mut usize) -> Result<(), EngineError>
where
    I: IntoIterator<Item = dbridge_api::Result<Box<dyn Record>>>,
    W: Write,
{
    for record in records {
        let bytes = record?.to_interchange()?;
        if *count > 0 {
            writer.write_all(b",")?;
        }
        writer.write_all(&bytes)?;
        *count += 1;
    }
    Ok(())
}
