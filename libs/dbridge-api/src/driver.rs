use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{DriverError, Result};
use crate::stream::{Cursor, Header, Meta, ResultStream};

// ════════════════════════════════════════════════════════════════
//  Introspection types
// ════════════════════════════════════════════════════════════════

/// One field observed in a table or collection.
///
/// `type` is the declared type for tabular backends; schema-less backends
/// report a synthetic tag such as `"collection"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub r#type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, r#type: impl Into<String>) -> Self {
        Self { name: name.into(), r#type: r#type.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureType {
    Schema,
    Table,
}

/// Node of the catalog tree: database/schema → tables/collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    pub name: String,
    pub schema: String,
    pub r#type: StructureType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Structure>,
}

impl Structure {
    pub fn schema(name: impl Into<String>, children: Vec<Structure>) -> Self {
        let name = name.into();
        Self { schema: name.clone(), name, r#type: StructureType::Schema, children }
    }

    pub fn table(name: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            r#type: StructureType::Table,
            children: Vec::new(),
        }
    }
}

/// Which table `columns` should describe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOptions {
    pub table: String,
    /// Database the table lives in. Empty means the selected one.
    #[serde(default)]
    pub schema: String,
}

impl TableOptions {
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into(), schema: String::new() }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }
}

/// Result of `list_databases`: the selection (empty = none) and every
/// database visible to the credentials, in backend order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseList {
    pub current: String,
    pub available: Vec<String>,
}

// ════════════════════════════════════════════════════════════════
//  Driver contract
// ════════════════════════════════════════════════════════════════

/// What callers program against, whatever the backend.
///
/// Calls on one instance must be serialized by the caller. `select_database`
/// does not check existence; an unknown name fails on first use.
pub trait Driver: Send {
    fn list_databases(&self) -> Result<DatabaseList>;

    fn select_database(&mut self, name: &str) -> Result<()>;

    fn columns(&self, opts: &TableOptions) -> Result<Vec<Column>>;

    /// Every visible database with its tables. Does not need a selection.
    fn structure(&self) -> Result<Vec<Structure>>;

    /// Run backend-native `query` verbatim. `cancel` is observed by the
    /// returned stream at each pull.
    fn query(&self, query: &str, cancel: CancellationToken) -> Result<ResultStream>;

    /// Release the connection. Later calls fail with `NotInitialized`.
    fn close(&mut self);
}

// ════════════════════════════════════════════════════════════════
//  Adapter boundary
// ════════════════════════════════════════════════════════════════

/// Opened cursor plus the shape of what it will produce.
pub struct QueryCursor {
    pub header: Header,
    pub meta: Meta,
    pub cursor: Box<dyn Cursor>,
}

/// Engine-specific half of a driver. One implementation per backend.
///
/// The adapter owns the live connection handle. It never sees an
/// unconnected or unselected state: `Session` checks that first.
pub trait Adapter: Send + Sync {
    fn databases(&self) -> Result<Vec<String>>;

    fn columns(&self, database: &str, opts: &TableOptions) -> Result<Vec<Column>>;

    fn structure(&self) -> Result<Vec<Structure>>;

    fn open_cursor(
        &self,
        database: &str,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<QueryCursor>;

    /// Release the connection handle. Default: nothing to release.
    fn close(&self) {}
}

/// Builds adapters for one backend from its JSON options.
///
/// Registered under a backend identifier; the registry picks the factory at
/// connection time.
pub trait AdapterFactory: Send + Sync {
    fn create(&self, options_json: &str) -> Result<Box<dyn Adapter>>;
}

// ════════════════════════════════════════════════════════════════
//  Session: Driver over an Adapter
// ════════════════════════════════════════════════════════════════

/// Connection state shared by every backend: the adapter (absent until
/// connected) and the selected database (empty until selected).
#[derive(Default)]
pub struct Session {
    adapter: Option<Box<dyn Adapter>>,
    database: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connected", &self.adapter.is_some())
            .field("database", &self.database)
            .finish()
    }
}

impl Session {
    /// Unconnected session.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(adapter: Box<dyn Adapter>) -> Self {
        Self { adapter: Some(adapter), database: String::new() }
    }

    pub fn is_connected(&self) -> bool {
        self.adapter.is_some()
    }

    pub fn current_database(&self) -> &str {
        &self.database
    }

    fn adapter(&self) -> Result<&dyn Adapter> {
        self.adapter.as_deref().ok_or_else(DriverError::not_initialized)
    }

    fn selected(&self) -> Result<(&dyn Adapter, &str)> {
        let adapter = self.adapter()?;
        if self.database.is_empty() {
            return Err(DriverError::no_database_selected());
        }
        Ok((adapter, &self.database))
    }
}

impl Driver for Session {
    fn list_databases(&self) -> Result<DatabaseList> {
        let adapter = self.adapter()?;
        tracing::debug!("fetching list of databases");
        let available = adapter
            .databases()
            .map_err(|e| e.with_context("failed to list databases"))?;
        Ok(DatabaseList { current: self.database.clone(), available })
    }

    fn select_database(&mut self, name: &str) -> Result<()> {
        self.adapter()?;
        if self.database != name {
            tracing::debug!(database = %name, "selecting database");
            self.database = name.to_string();
        }
        Ok(())
    }

    fn columns(&self, opts: &TableOptions) -> Result<Vec<Column>> {
        let (adapter, selected) = self.selected()?;
        let database = if opts.schema.is_empty() { selected } else { opts.schema.as_str() };
        tracing::debug!(database = %database, table = %opts.table, "fetching columns");
        adapter
            .columns(database, opts)
            .map_err(|e| e.with_context(format!("failed to fetch columns of '{}'", opts.table)))
    }

    fn structure(&self) -> Result<Vec<Structure>> {
        let adapter = self.adapter()?;
        tracing::debug!("fetching structure");
        adapter.structure().map_err(|e| e.with_context("failed to fetch structure"))
    }

    fn query(&self, query: &str, cancel: CancellationToken) -> Result<ResultStream> {
        let (adapter, database) = self.selected()?;
        tracing::debug!(database = %database, query = %query, "executing query");
        let opened = adapter
            .open_cursor(database, query, &cancel)
            .map_err(|e| e.with_context("query execution failed"))?;
        Ok(ResultStream::new(opened.header, opened.meta, opened.cursor, cancel))
    }

    fn close(&mut self) {
        if let Some(adapter) = self.adapter.take() {
            tracing::debug!("closing connection");
            adapter.close();
        }
        self.database.clear();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
