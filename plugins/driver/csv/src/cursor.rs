use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use dbridge_api::{CancellationToken, Cursor, DriverError, Envelope, Header, Record, Result};

use crate::parser::{has_open_quote, parse_fields};

/// Field splitting settings shared by header and row reads.
#[derive(Debug, Clone, Copy)]
pub struct Dialect {
    pub delimiter: char,
    pub quoting: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self { delimiter: ',', quoting: true }
    }
}

/// Line reader that joins physical lines belonging to one quoted record
/// and skips blank lines.
struct RecordReader {
    reader: BufReader<File>,
    dialect: Dialect,
    /// Physical line number of the last line consumed.
    line_no: usize,
}

impl RecordReader {
    fn open(path: &Path, dialect: Dialect) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            DriverError::backend(format!("failed to open '{}': {e}", path.display())).with_source(e)
        })?;
        Ok(Self { reader: BufReader::new(file), dialect, line_no: 0 })
    }

    fn read_line(&mut self, buf: &mut String) -> Result<bool> {
        let n = self.reader.read_line(buf)?;
        if n == 0 {
            return Ok(false);
        }
        self.line_no += 1;
        let trimmed = buf.trim_end_matches(['\r', '\n']).len();
        buf.truncate(trimmed);
        Ok(true)
    }

    /// Next record's fields and the line it started on, `None` at end of file.
    fn next_record(&mut self) -> Result<Option<(usize, Vec<String>)>> {
        let mut text = String::new();
        loop {
            text.clear();
            if !self.read_line(&mut text)? {
                return Ok(None);
            }
            if !text.is_empty() {
                break;
            }
        }
        let start = self.line_no;

        if self.dialect.quoting {
            while has_open_quote(&text, self.dialect.delimiter) {
                let mut more = String::new();
                if !self.read_line(&mut more)? {
                    break;
                }
                text.push('\n');
                text.push_str(&more);
            }
        }
        Ok(Some((start, parse_fields(&text, self.dialect.delimiter, self.dialect.quoting))))
    }
}

fn header_of(fields: Vec<String>) -> Header {
    Header::new(fields.into_iter().map(|f| f.trim().to_string()))
}

/// Column names from the first line of a CSV file. Empty file: no columns.
pub fn read_header(path: &Path, dialect: Dialect) -> Result<Header> {
    let mut reader = RecordReader::open(path, dialect)?;
    Ok(reader.next_record()?.map(|(_, f)| header_of(f)).unwrap_or_default())
}

/// Lazy cursor over the data lines of one CSV file.
///
/// Reads one record per `fetch`. The file handle is released on `close`.
pub struct CsvCursor {
    table: String,
    reader: Option<RecordReader>,
    width: usize,
    remaining: Option<usize>,
}

impl CsvCursor {
    /// Open `path`, consume its header line and position at the first row.
    pub fn open(
        path: &Path,
        table: impl Into<String>,
        dialect: Dialect,
        limit: Option<usize>,
    ) -> Result<(Header, Self)> {
        let mut reader = RecordReader::open(path, dialect)?;
        let header = reader.next_record()?.map(|(_, f)| header_of(f)).unwrap_or_default();
        let cursor = Self {
            table: table.into(),
            reader: Some(reader),
            width: header.len(),
            remaining: limit,
        };
        Ok((header, cursor))
    }
}

impl Cursor for CsvCursor {
    fn fetch(&mut self, cancel: &CancellationToken) -> Result<Option<Box<dyn Record>>> {
        if cancel.is_cancelled() {
            return Err(DriverError::cancelled());
        }
        if self.remaining == Some(0) {
            return Ok(None);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        let Some((line, fields)) = reader.next_record()? else {
            return Ok(None);
        };
        if fields.len() != self.width {
            return Err(DriverError::backend(format!(
                "{} line {line}: expected {} fields, found {}",
                self.table,
                self.width,
                fields.len()
            )));
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        Ok(Some(Envelope::boxed(fields)))
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            tracing::trace!(table = %self.table, "csv file closed");
        }
    }
}
