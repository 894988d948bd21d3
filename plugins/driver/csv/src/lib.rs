//! CSV directory backend.
//!
//! The root directory is the server: every sub-directory is a database and
//! every `*.csv` file inside it a table whose first line names the columns.

mod cursor;
mod parser;
mod query;

use std::path::{Path, PathBuf};

use dbridge_api::{
    Adapter, AdapterFactory, CancellationToken, Column, DriverError, Meta, QueryCursor, Result,
    Structure, TableOptions,
};

pub use cursor::{CsvCursor, Dialect, read_header};
pub use query::CsvQuery;

/// Backend identifier used in connection configs.
pub const BACKEND_ID: &str = "csv";

/// Type tag reported for every CSV column.
pub const TEXT_TYPE: &str = "text";

const TABLE_EXTENSION: &str = "csv";

// ---- Config ----

#[derive(Debug, serde::Deserialize)]
#[serde(default)]
pub struct CsvDriverConfig {
    /// Directory holding one sub-directory per database.
    pub root: PathBuf,

    /// Field delimiter (default ",", `\t` for tab).
    pub delimiter: String,

    /// RFC 4180 double-quote handling (default true).
    pub quoting: bool,
}

impl Default for CsvDriverConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            delimiter: ",".to_string(),
            quoting: true,
        }
    }
}

// ---- CsvAdapter ----

#[derive(Debug, Clone)]
pub struct CsvAdapter {
    root: PathBuf,
    dialect: Dialect,
}

impl CsvAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), dialect: Dialect::default() }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn from_config(config: CsvDriverConfig) -> Result<Self> {
        if config.root.as_os_str().is_empty() {
            return Err(DriverError::config("csv: 'root' is required"));
        }
        let delimiter = parser::parse_delimiter(&config.delimiter)?;
        Ok(Self::new(config.root).with_dialect(Dialect { delimiter, quoting: config.quoting }))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn database_dir(&self, database: &str) -> Result<PathBuf> {
        let dir = self.root.join(database);
        let escapes = matches!(database, "" | "." | "..") || database.contains(['/', '\\']);
        if escapes || !dir.is_dir() {
            return Err(DriverError::backend(format!("database '{database}' not found")));
        }
        Ok(dir)
    }

    fn table_path(&self, database: &str, table: &str) -> Result<PathBuf> {
        let path = self.database_dir(database)?.join(format!("{table}.{TABLE_EXTENSION}"));
        if !path.is_file() {
            return Err(DriverError::backend(format!(
                "table '{table}' not found in database '{database}'"
            )));
        }
        Ok(path)
    }

    /// Table names of one database directory, sorted.
    fn tables(&self, dir: &Path) -> Result<Vec<String>> {
        let mut tables = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != TABLE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                tables.push(stem.to_string());
            }
        }
        tables.sort();
        Ok(tables)
    }
}

impl Adapter for CsvAdapter {
    fn databases(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            DriverError::backend(format!("cannot read '{}': {e}", self.root.display())).with_source(e)
        })?;
        let mut databases = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => databases.push(name),
                Err(name) => tracing::warn!(?name, "skipping non UTF-8 database directory"),
            }
        }
        databases.sort();
        Ok(databases)
    }

    fn columns(&self, database: &str, opts: &TableOptions) -> Result<Vec<Column>> {
        let path = self.table_path(database, &opts.table)?;
        let header = read_header(&path, self.dialect)?;
        Ok(header.names().iter().map(|name| Column::new(name, TEXT_TYPE)).collect())
    }

    fn structure(&self) -> Result<Vec<Structure>> {
        self.databases()?
            .into_iter()
            .map(|database| -> Result<Structure> {
                let tables = self.tables(&self.root.join(&database))?;
                let children = tables.iter().map(|t| Structure::table(t, &database)).collect();
                Ok(Structure::schema(database, children))
            })
            .collect()
    }

    fn open_cursor(
        &self,
        database: &str,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<QueryCursor> {
        let parsed = CsvQuery::parse(query)?;
        let path = self.table_path(database, &parsed.table)?;
        if cancel.is_cancelled() {
            return Err(DriverError::cancelled());
        }
        let (header, cursor) = CsvCursor::open(&path, &parsed.table, self.dialect, parsed.limit)?;
        tracing::debug!(database = %database, table = %parsed.table, columns = header.len(), "csv table opened");
        Ok(QueryCursor { header, meta: Meta::tabular(), cursor: Box::new(cursor) })
    }
}

// ---- Factory ----

/// Builds a `CsvAdapter` from JSON options: `{"root": "/data", "delimiter": ";"}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvAdapterFactory;

impl AdapterFactory for CsvAdapterFactory {
    fn create(&self, options_json: &str) -> Result<Box<dyn Adapter>> {
        let config: CsvDriverConfig = serde_json::from_str(options_json)
            .map_err(|e| DriverError::config(format!("csv: invalid options: {e}")))?;
        let adapter = CsvAdapter::from_config(config)?;
        if !adapter.root().is_dir() {
            return Err(DriverError::backend(format!(
                "csv: root '{}' is not a directory",
                adapter.root().display()
            )));
        }
        tracing::info!(root = %adapter.root().display(), "csv adapter created");
        Ok(Box::new(adapter))
    }
}
