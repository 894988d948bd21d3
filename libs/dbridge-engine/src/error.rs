use dbridge_api::DriverError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    #[error("connection already exists: {0}")]
    DuplicateConnection(String),

    #[error("connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache error: {0}")]
    Cache(String),
}

impl EngineError {
    /// Add context to the error.
    ///
    /// For `Driver`, context goes to the inner `DriverError` so its kind
    /// survives. Message variants get the context prepended.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            EngineError::Driver(e) => EngineError::Driver(e.with_context(ctx)),
            EngineError::Config(msg) => EngineError::Config(format!("{ctx}: {msg}")),
            EngineError::Cache(msg) => EngineError::Cache(format!("{ctx}: {msg}")),
            other => other,
        }
    }

    /// Kind of the wrapped driver error, if any.
    pub fn driver_kind(&self) -> Option<dbridge_api::ErrorKind> {
        match self {
            EngineError::Driver(e) => Some(e.kind()),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(e: toml::de::Error) -> Self {
        EngineError::Config(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for EngineError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        EngineError::Cache(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for EngineError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        EngineError::Cache(e.to_string())
    }
}
