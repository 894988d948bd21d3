//! Runtime around the driver contract: backend registry, connection config,
//! live connections, result caching and output rendering.

pub mod cache;
pub mod config;
pub mod error;
pub mod manager;
pub mod output;
pub mod registry;

pub use cache::ResultCache;
pub use config::{ConnectionConfig, EngineConfig, config_json_or_empty};
pub use error::EngineError;
pub use manager::{Connection, ConnectionManager};
pub use output::{OutputFormat, write_records};
pub use registry::DriverRegistry;
