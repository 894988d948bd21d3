//! Backend-agnostic data access: the driver contract, the pull-based
//! result stream and the value envelope every backend adapter produces.

pub mod driver;
pub mod envelope;
pub mod error;
pub mod sample;
pub mod stream;

pub use driver::{
    Adapter, AdapterFactory, Column, DatabaseList, Driver, QueryCursor, Session, Structure, StructureType,
    TableOptions,
};
pub use envelope::{Document, Envelope, Record, decode_binary, decode_interchange};
pub use error::{DriverError, ErrorKind, Result};
pub use sample::ColumnSampler;
pub use stream::{
    Cursor, FailReason, Header, Meta, ResultStream, ResultStreamBuilder, SchemaType, StreamState,
    VecCursor,
};

pub use tokio_util::sync::CancellationToken;
