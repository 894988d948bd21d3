use dbridge_api::{DriverError, Result};

/// Parsed CSV query: which table to read and how many rows at most.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvQuery {
    pub table: String,
    pub limit: Option<usize>,
}

impl CsvQuery {
    /// Accepts `SELECT * FROM <table> [LIMIT <n>]` (keywords in any case,
    /// optional trailing `;`) or a bare table name.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim().trim_end_matches(';').trim_end();
        let tokens: Vec<&str> = text.split_whitespace().collect();

        match tokens.as_slice() {
            [table] => Ok(Self { table: unquote(table)?, limit: None }),
            [select, star, from, table] if is_select(select, star, from) => {
                Ok(Self { table: unquote(table)?, limit: None })
            }
            [select, star, from, table, limit, n]
                if is_select(select, star, from) && limit.eq_ignore_ascii_case("limit") =>
            {
                let n = n
                    .parse()
                    .map_err(|_| DriverError::query(format!("csv: invalid LIMIT {n:?}")))?;
                Ok(Self { table: unquote(table)?, limit: Some(n) })
            }
            [] => Err(DriverError::query("csv: empty query")),
            _ => Err(DriverError::query(format!(
                "csv: unsupported query {text:?}, expected SELECT * FROM <table> [LIMIT n]"
            ))),
        }
    }
}

fn is_select(select: &str, star: &str, from: &str) -> bool {
    select.eq_ignore_ascii_case("select") && star == "*" && from.eq_ignore_ascii_case("from")
}

/// Strip optional double quotes around an identifier and reject names that
/// would leave the database directory.
fn unquote(name: &str) -> Result<String> {
    let name = name
        .strip_prefix('"')
        .and_then(|n| n.strip_suffix('"'))
        .unwrap_or(name);
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(DriverError::query(format!("csv: invalid table name {name:?}")));
    }
    Ok(name.to_string())
}
