use std::collections::BTreeMap;

use dbridge_api::{
    CancellationToken, Column, DatabaseList, Driver, ResultStream, Session, Structure, TableOptions,
};

use crate::cache::ResultCache;
use crate::config::{ConnectionConfig, EngineConfig, config_json_or_empty};
use crate::error::EngineError;
use crate::registry::DriverRegistry;

/// A configured connection and its live session.
#[derive(Debug)]
pub struct Connection {
    params: ConnectionConfig,
    session: Session,
}

impl Connection {
    pub fn new(params: ConnectionConfig, session: Session) -> Self {
        Self { params, session }
    }

    pub fn id(&self) -> &str {
        &self.params.id
    }

    pub fn params(&self) -> &ConnectionConfig {
        &self.params
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run `query` and drain every row into a `ResultCache`.
    pub fn execute(&self, query: &str, cancel: CancellationToken) -> Result<ResultCache, EngineError> {
        let ctx = || format!("connection '{}'", self.params.id);
        let mut stream = self.session.query(query, cancel).map_err(|e| e.with_context(ctx()))?;
        let mut cache = ResultCache::new(stream.header().clone(), stream.meta().clone());
        let rows = cache.fill(&mut stream).map_err(|e| e.with_context(ctx()))?;
        tracing::debug!(connection = %self.params.id, rows, "query cached");
        Ok(cache)
    }
}

impl Driver for Connection {
    fn list_databases(&self) -> dbridge_api::Result<DatabaseList> {
        self.session.list_databases()
    }

    fn select_database(&mut self, name: &str) -> dbridge_api::Result<()> {
        self.session.select_database(name)
    }

    fn columns(&self, opts: &TableOptions) -> dbridge_api::Result<Vec<Column>> {
        self.session.columns(opts)
    }

    fn structure(&self) -> dbridge_api::Result<Vec<Structure>> {
        self.session.structure()
    }

    fn query(&self, query: &str, cancel: CancellationToken) -> dbridge_api::Result<ResultStream> {
        self.session.query(query, cancel)
    }

    fn close(&mut self) {
        self.session.close();
    }
}

/// Live connections by id, plus the registry that builds them.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    registry: DriverRegistry,
    connections: BTreeMap<String, Connection>,
}

impl ConnectionManager {
    pub fn new(registry: DriverRegistry) -> Self {
        Self { registry, connections: BTreeMap::new() }
    }

    /// Connect every configured entry and apply its initial database.
    pub fn bootstrap(config: &EngineConfig, registry: DriverRegistry) -> Result<Self, EngineError> {
        config.validate()?;
        let mut manager = Self::new(registry);
        for params in &config.connections {
            manager.add(params.clone())?;
        }
        tracing::info!(connections = manager.connections.len(), "connections bootstrapped");
        Ok(manager)
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Open a new connection. Fails if the id is already in use.
    pub fn add(&mut self, params: ConnectionConfig) -> Result<&mut Connection, EngineError> {
        if self.connections.contains_key(&params.id) {
            return Err(EngineError::DuplicateConnection(params.id));
        }
        let ctx = format!("connection '{}'", params.id);
        let options = config_json_or_empty(&params.options).map_err(|e| e.with_context(&ctx))?;
        let mut session = self
            .registry
            .connect(&params.backend, &options)
            .map_err(|e| e.with_context(&ctx))?;
        if let Some(database) = &params.database {
            session.select_database(database).map_err(|e| EngineError::from(e).with_context(&ctx))?;
        }
        tracing::info!(
            connection = %params.id,
            name = %params.display_name(),
            backend = %params.backend,
            "connection opened"
        );

        let id = params.id.clone();
        Ok(self.connections.entry(id).or_insert(Connection::new(params, session)))
    }

    pub fn get(&self, id: &str) -> Result<&Connection, EngineError> {
        self.connections
            .get(id)
            .ok_or_else(|| EngineError::ConnectionNotFound(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut Connection, EngineError> {
        self.connections
            .get_mut(id)
            .ok_or_else(|| EngineError::ConnectionNotFound(id.to_string()))
    }

    /// Close and forget a connection.
    pub fn remove(&mut self, id: &str) -> Result<(), EngineError> {
        let mut conn = self
            .connections
            .remove(id)
            .ok_or_else(|| EngineError::ConnectionNotFound(id.to_string()))?;
        conn.close();
        tracing::info!(connection = %id, "connection closed");
        Ok(())
    }

    /// Connection ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        self.connections.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
