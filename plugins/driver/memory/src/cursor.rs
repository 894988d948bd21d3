use std::collections::VecDeque;

use dbridge_api::{CancellationToken, Cursor, DriverError, Envelope, Record, Result};

use crate::query::matches;
use crate::store::{self, MemoryStore};

/// Batched cursor over one collection.
///
/// Documents are copied out of the store `batch_size` at a time; the
/// cancellation signal is checked before each batch.
pub struct MemoryCursor {
    store: MemoryStore,
    database: String,
    collection: String,
    filter: serde_json::Map<String, serde_json::Value>,
    remaining: Option<usize>,
    batch_size: usize,
    /// Index of the next document to scan.
    position: usize,
    buffer: VecDeque<serde_json::Value>,
    done: bool,
}

impl MemoryCursor {
    pub fn new(
        store: MemoryStore,
        database: impl Into<String>,
        collection: impl Into<String>,
        filter: serde_json::Map<String, serde_json::Value>,
        limit: Option<usize>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            database: database.into(),
            collection: collection.into(),
            filter,
            remaining: limit,
            batch_size: batch_size.max(1),
            position: 0,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    fn fill(&mut self) -> Result<()> {
        let guard = self.store.read()?;
        let collections = store::database(&guard, &self.database)?;
        let documents = store::collection(collections, &self.database, &self.collection)?;

        let mut want = self.batch_size;
        if let Some(remaining) = self.remaining {
            want = want.min(remaining);
        }
        while self.buffer.len() < want {
            let Some(doc) = documents.get(self.position) else {
                self.done = true;
                break;
            };
            self.position += 1;
            if matches(doc, &self.filter) {
                self.buffer.push_back(doc.clone());
            }
        }
        tracing::trace!(
            collection = %self.collection,
            batch = self.buffer.len(),
            position = self.position,
            "memory cursor batch fetched"
        );
        Ok(())
    }
}

impl Cursor for MemoryCursor {
    fn fetch(&mut self, cancel: &CancellationToken) -> Result<Option<Box<dyn Record>>> {
        if self.remaining == Some(0) {
            return Ok(None);
        }
        if self.buffer.is_empty() {
            if self.done {
                return Ok(None);
            }
            if cancel.is_cancelled() {
                return Err(DriverError::cancelled());
            }
            self.fill()?;
        }
        let Some(doc) = self.buffer.pop_front() else {
            return Ok(None);
        };
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        Ok(Some(Envelope::boxed(doc)))
    }

    fn close(&mut self) {
        self.buffer.clear();
        self.done = true;
    }
}
