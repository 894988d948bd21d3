use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::EngineError;

/// Root configuration, parsed from TOML.
///
/// ```toml
/// [[connections]]
/// id = "local"
/// name = "Local documents"
/// backend = "memory"
/// database = "shop"
///
/// [connections.options]
/// batch_size = 50
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

/// One configured connection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConnectionConfig {
    pub id: String,
    /// Display name. Defaults to the id.
    #[serde(default)]
    pub name: String,
    /// Backend identifier registered in the `DriverRegistry`.
    pub backend: String,
    /// Database selected right after connecting.
    #[serde(default)]
    pub database: Option<String>,
    /// Backend options, handed to the adapter factory as JSON.
    #[serde(default)]
    pub options: Option<toml::Value>,
}

impl ConnectionConfig {
    pub fn new(id: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            backend: backend.into(),
            database: None,
            options: None,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_options(mut self, options: toml::Value) -> Self {
        self.options = Some(options);
        self
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::parse(&content).map_err(|e| e.with_context(path.display()))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Ids must be non-empty and unique; every entry needs a backend.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut seen = HashSet::new();
        for (i, conn) in self.connections.iter().enumerate() {
            let ctx = format!("connections[{i}]");
            if conn.id.trim().is_empty() {
                return Err(EngineError::Config("empty id".into()).with_context(ctx));
            }
            if conn.backend.trim().is_empty() {
                return Err(EngineError::Config(format!("connection '{}' has no backend", conn.id))
                    .with_context(ctx));
            }
            if !seen.insert(conn.id.as_str()) {
                return Err(EngineError::Config(format!("duplicate connection id '{}'", conn.id))
                    .with_context(ctx));
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════

/// Serialize optional backend options to a JSON string (or `"{}"`).
pub fn config_json_or_empty(val: &Option<toml::Value>) -> Result<String, EngineError> {
    match val {
        Some(v) => serde_json::to_string(v)
            .map_err(|e| EngineError::Config(format!("options are not JSON-representable: {e}"))),
        None => Ok("{}".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[connections]]
id = "local"
name = "Local documents"
backend = "memory"
database = "shop"

[connections.options]
batch_size = 50

[connections.options.databases.shop]
orders = [{ id = 1, amount = 10 }]

[[connections]]
id = "files"
backend = "csv"
options = { root = "/srv/csv", delimiter = ";" }
"#;

    #[test]
    fn test_parse_connections() {
        let config = EngineConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.connections.len(), 2);

        let local = &config.connections[0];
        assert_eq!(local.display_name(), "Local documents");
        assert_eq!(local.database.as_deref(), Some("shop"));

        let files = &config.connections[1];
        assert_eq!(files.display_name(), "files");
        assert_eq!(files.database, None);
    }

    #[test]
    fn test_options_become_json() {
        let config = EngineConfig::parse(SAMPLE).unwrap();
        let json = config_json_or_empty(&config.connections[0].options).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["batch_size"], 50);
        assert_eq!(value["databases"]["shop"]["orders"][0]["amount"], 10);

        assert_eq!(config_json_or_empty(&None).unwrap(), "{}");
    }

    #[test]
    fn test_empty_config_is_valid() {
        assert!(EngineConfig::parse("").unwrap().connections.is_empty());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let toml = r#"
[[connections]]
id = "a"
backend = "memory"

[[connections]]
id = "a"
backend = "csv"
"#;
        let err = EngineConfig::parse(toml).unwrap_err();
        assert_eq!(err.to_string(), "config error: connections[1]: duplicate connection id 'a'");
    }

    #[test]
    fn test_missing_backend_rejected() {
        let err = EngineConfig::parse("[[connections]]\nid = \"a\"\nbackend = \"\"\n").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));

        let err = EngineConfig::parse("[[connections]]\nid = \"a\"\n").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_load_reports_path() {
        let err = EngineConfig::load("/no/such/dbridge.toml").unwrap_err();
        assert!(err.to_string().contains("/no/such/dbridge.toml"));
    }
}
