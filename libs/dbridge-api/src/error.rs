use std::fmt;

/// Category of a driver error. Lets the caller tell "no rows" apart from
/// failure and decide whether reconnecting or reselecting can help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No live connection. Not retryable without reconnecting.
    NotInitialized,
    /// Operation needs a selected database.
    NoDatabaseSelected,
    /// Connection or introspection call failed in the backend.
    BackendUnavailable,
    /// A stream fetch failed mid-way. Terminal for that stream.
    StreamRead,
    /// The caller's cancellation signal fired.
    Cancelled,
    /// Pull on a stream that already reached a terminal state.
    StreamClosed,
    /// Value cannot be represented in the requested encoding.
    Encode,
    /// Bytes cannot be reconstructed into a value.
    Decode,
    /// Invalid adapter configuration.
    Config,
    /// Query text rejected by the backend adapter.
    Query,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ErrorKind::NotInitialized => "not initialized",
            ErrorKind::NoDatabaseSelected => "no database selected",
            ErrorKind::BackendUnavailable => "backend unavailable",
            ErrorKind::StreamRead => "stream read",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::StreamClosed => "stream closed",
            ErrorKind::Encode => "encode",
            ErrorKind::Decode => "decode",
            ErrorKind::Config => "config",
            ErrorKind::Query => "query",
        };
        f.write_str(tag)
    }
}

type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error returned by every fallible driver, stream and envelope operation.
///
/// Carries an `ErrorKind`, a human-readable message and, when the failure
/// came from a lower layer, the original cause (available through
/// `std::error::Error::source`).
pub struct DriverError {
    kind: ErrorKind,
    message: String,
    source: Option<Cause>,
}

pub type Result<T, E = DriverError> = std::result::Result<T, E>;

impl DriverError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into(), source: None }
    }

    pub fn not_initialized() -> Self {
        Self::new(ErrorKind::NotInitialized, "driver is not initialized")
    }

    pub fn no_database_selected() -> Self {
        Self::new(ErrorKind::NoDatabaseSelected, "database not selected")
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BackendUnavailable, msg)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "query cancelled")
    }

    pub fn stream_closed() -> Self {
        Self::new(ErrorKind::StreamClosed, "result stream already finished")
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Encode, msg)
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, msg)
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Query, msg)
    }

    /// Wrap a failed fetch. The original error becomes the cause.
    pub fn stream_read(cause: DriverError) -> Self {
        Self {
            kind: ErrorKind::StreamRead,
            message: format!("failed to read next item: {}", cause.message),
            source: Some(Box::new(cause)),
        }
    }

    /// Attach an underlying cause, keeping kind and message.
    pub fn with_source(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(cause));
        self
    }

    /// Add context to the error, preserving kind and cause.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
            source: self.source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// From impls: lower-level errors → DriverError with the matching kind
// ---------------------------------------------------------------------------

impl From<serde_json::Error> for DriverError {
    fn from(e: serde_json::Error) -> Self {
        Self::encode(format!("interchange: {e}")).with_source(e)
    }
}

impl From<rmp_serde::encode::Error> for DriverError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Self::encode(format!("binary: {e}")).with_source(e)
    }
}

impl From<rmp_serde::decode::Error> for DriverError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Self::decode(format!("binary: {e}")).with_source(e)
    }
}

impl From<std::io::Error> for DriverError {
    fn from(e: std::io::Error) -> Self {
        Self::backend(e.to_string()).with_source(e)
    }
}
