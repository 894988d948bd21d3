use std::collections::HashMap;
use std::sync::Arc;

use dbridge_api::{Adapter, AdapterFactory, Session};

use crate::error::EngineError;

/// Adapter factories keyed by backend identifier.
#[derive(Default, Clone)]
pub struct DriverRegistry {
    factories: HashMap<String, Arc<dyn AdapterFactory>>,
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry").field("backends", &self.backends()).finish()
    }
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `id`, replacing any previous one.
    pub fn register(&mut self, id: impl Into<String>, factory: impl AdapterFactory + 'static) -> &mut Self {
        let id = id.into();
        if self.factories.insert(id.clone(), Arc::new(factory)).is_some() {
            tracing::warn!(backend = %id, "backend factory replaced");
        } else {
            tracing::debug!(backend = %id, "backend registered");
        }
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered identifiers, sorted.
    pub fn backends(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn create_adapter(&self, id: &str, options_json: &str) -> Result<Box<dyn Adapter>, EngineError> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| EngineError::UnknownBackend(id.to_string()))?;
        let adapter = factory
            .create(options_json)
            .map_err(|e| e.with_context(format!("backend '{id}'")))?;
        Ok(adapter)
    }

    /// Build an adapter and wrap it in a connected `Session`.
    pub fn connect(&self, id: &str, options_json: &str) -> Result<Session, EngineError> {
        Ok(Session::connect(self.create_adapter(id, options_json)?))
    }
}
