//! In-process document backend.
//!
//! Databases hold collections of JSON documents with no fixed schema. Queries
//! are JSON objects (see [`MemoryQuery`]).

mod config;
mod cursor;
mod query;
mod store;

use dbridge_api::{
    Adapter, AdapterFactory, CancellationToken, Column, ColumnSampler, DriverError, Envelope,
    Header, Meta, QueryCursor, Result, Structure, TableOptions, VecCursor,
};

pub use config::MemoryDriverConfig;
pub use cursor::MemoryCursor;
pub use query::{MemoryQuery, resolve_path};
pub use store::{Collections, MemoryStore};

/// Backend identifier used in connection configs.
pub const BACKEND_ID: &str = "memory";

/// Single header label of every memory result.
const RESULTS_LABEL: &str = "Results";

// ════════════════════════════════════════════════════════════════
//  MemoryAdapter
// ════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct MemoryAdapter {
    store: MemoryStore,
    batch_size: usize,
    sampler: ColumnSampler,
}

impl MemoryAdapter {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            batch_size: MemoryDriverConfig::default().batch_size,
            sampler: ColumnSampler::default(),
        }
    }

    pub fn from_config(config: MemoryDriverConfig) -> Self {
        let store = MemoryStore::from_databases(config.databases);
        Self { batch_size: config.batch_size, ..Self::new(store) }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    fn insert(&self, database: &str, collection: &str, documents: Vec<serde_json::Value>) -> Result<QueryCursor> {
        store::database(&*self.store.read()?, database)?;
        let inserted = self.store.insert(database, collection, documents)?;
        tracing::debug!(database = %database, collection = %collection, inserted, "documents inserted");

        Ok(QueryCursor {
            header: Header::new([RESULTS_LABEL]),
            meta: Meta::schema_less(),
            cursor: Box::new(VecCursor::new(vec![Envelope::boxed(
                serde_json::json!({ "inserted": inserted }),
            )])),
        })
    }
}

impl Adapter for MemoryAdapter {
    fn databases(&self) -> Result<Vec<String>> {
        Ok(self.store.read()?.keys().cloned().collect())
    }

    fn columns(&self, database: &str, opts: &TableOptions) -> Result<Vec<Column>> {
        let guard = self.store.read()?;
        let collections = store::database(&guard, database)?;
        let documents = store::collection(collections, database, &opts.table)?;
        Ok(self.sampler.sample(documents))
    }

    fn structure(&self) -> Result<Vec<Structure>> {
        let guard = self.store.read()?;
        Ok(guard
            .iter()
            .map(|(database, collections)| {
                let tables = collections.keys().map(|c| Structure::table(c, database)).collect();
                Structure::schema(database, tables)
            })
            .collect())
    }

    fn open_cursor(
        &self,
        database: &str,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<QueryCursor> {
        if cancel.is_cancelled() {
            return Err(DriverError::cancelled());
        }
        match MemoryQuery::parse(query)? {
            MemoryQuery::Insert { insert, documents } => self.insert(database, &insert, documents),
            MemoryQuery::Find { collection, filter, limit } => {
                {
                    let guard = self.store.read()?;
                    let collections = store::database(&guard, database)?;
                    store::collection(collections, database, &collection)?;
                }
                let cursor = MemoryCursor::new(
                    self.store.clone(),
                    database,
                    collection,
                    filter,
                    limit,
                    self.batch_size,
                );
                Ok(QueryCursor {
                    header: Header::new([RESULTS_LABEL]),
                    meta: Meta::schema_less(),
                    cursor: Box::new(cursor),
                })
            }
        }
    }

    fn close(&self) {
        tracing::debug!("memory adapter closed");
    }
}

// ════════════════════════════════════════════════════════════════
//  Factory
// ════════════════════════════════════════════════════════════════

/// Builds a `MemoryAdapter` from JSON options. Every adapter built by one
/// factory owns a separate store.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryAdapterFactory;

impl AdapterFactory for MemoryAdapterFactory {
    fn create(&self, options_json: &str) -> Result<Box<dyn Adapter>> {
        let config: MemoryDriverConfig = if options_json.trim().is_empty() {
            MemoryDriverConfig::default()
        } else {
            serde_json::from_str(options_json)
                .map_err(|e| DriverError::config(format!("memory: invalid options: {e}")))?
        };
        if config.batch_size == 0 {
            return Err(DriverError::config("memory: batch_size must be positive"));
        }
        tracing::info!(
            databases = config.databases.len(),
            batch_size = config.batch_size,
            "memory adapter created"
        );
        Ok(Box::new(MemoryAdapter::from_config(config)))
    }
}
