use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dbridge_api::{DriverError, Result};

/// Collection name → documents, in insertion order.
pub type Collections = BTreeMap<String, Vec<serde_json::Value>>;

/// Schema-less document store: databases → collections → documents.
///
/// Cheap to clone; clones share the same data, the way several client
/// handles share one server.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<BTreeMap<String, Collections>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_databases(databases: BTreeMap<String, Collections>) -> Self {
        Self { inner: Arc::new(RwLock::new(databases)) }
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Collections>>> {
        self.inner.read().map_err(|_| DriverError::backend("memory store lock poisoned"))
    }

    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Collections>>> {
        self.inner.write().map_err(|_| DriverError::backend("memory store lock poisoned"))
    }

    /// Create an empty database if it does not exist.
    pub fn create_database(&self, database: &str) -> Result<()> {
        self.write()?.entry(database.to_string()).or_default();
        Ok(())
    }

    /// Append documents, creating the database and collection on demand.
    /// Returns the number of documents stored.
    pub fn insert(
        &self,
        database: &str,
        collection: &str,
        documents: impl IntoIterator<Item = serde_json::Value>,
    ) -> Result<usize> {
        let mut guard = self.write()?;
        let target = guard
            .entry(database.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default();
        let before = target.len();
        target.extend(documents);
        Ok(target.len() - before)
    }

    /// Number of documents in a collection, `None` if it does not exist.
    pub fn count(&self, database: &str, collection: &str) -> Result<Option<usize>> {
        Ok(self.read()?.get(database).and_then(|c| c.get(collection)).map(Vec::len))
    }
}

/// Lookup helpers producing the backend's "not found" errors.
pub(crate) fn database<'a>(
    databases: &'a BTreeMap<String, Collections>,
    name: &str,
) -> Result<&'a Collections> {
    databases
        .get(name)
        .ok_or_else(|| DriverError::backend(format!("database '{name}' not found")))
}

pub(crate) fn collection<'a>(
    collections: &'a Collections,
    database: &str,
    name: &str,
) -> Result<&'a Vec<serde_json::Value>> {
    collections.get(name).ok_or_else(|| {
        DriverError::backend(format!("collection '{name}' not found in database '{database}'"))
    })
}
