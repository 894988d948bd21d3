use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::envelope::Record;
use crate::error::{DriverError, ErrorKind, Result};

// ════════════════════════════════════════════════════════════════
//  Header / Meta
// ════════════════════════════════════════════════════════════════

/// Ordered column names of a result. Schema-less results usually carry a
/// single synthetic label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header(pub Vec<String>);

impl Header {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Shape of the rows in a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaType {
    /// Every row has the columns named in the header.
    #[default]
    Tabular,
    /// Rows may differ in shape.
    SchemaLess,
}

/// Stream-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub schema_type: SchemaType,
}

impl Meta {
    pub fn tabular() -> Self {
        Self { schema_type: SchemaType::Tabular }
    }

    pub fn schema_less() -> Self {
        Self { schema_type: SchemaType::SchemaLess }
    }
}

// ════════════════════════════════════════════════════════════════
//  Cursor (backend side)
// ════════════════════════════════════════════════════════════════

/// Backend-side position in a result set. Owned by exactly one stream.
///
/// `fetch` may block on I/O and may pull a whole batch internally; it should
/// check `cancel` at its own blocking points. `close` releases backend
/// resources and is called at most once.
pub trait Cursor: Send {
    /// Next item, or `None` once the backend has nothing more.
    fn fetch(&mut self, cancel: &CancellationToken) -> Result<Option<Box<dyn Record>>>;

    fn close(&mut self);
}

/// Cursor over records that were already fetched (a single batch, a
/// command acknowledgement, an empty result).
#[derive(Debug, Default)]
pub struct VecCursor {
    records: VecDeque<Box<dyn Record>>,
}

impl VecCursor {
    pub fn new(records: Vec<Box<dyn Record>>) -> Self {
        Self { records: records.into() }
    }
}

impl Cursor for VecCursor {
    fn fetch(&mut self, _cancel: &CancellationToken) -> Result<Option<Box<dyn Record>>> {
        Ok(self.records.pop_front())
    }

    fn close(&mut self) {
        self.records.clear();
    }
}

// ════════════════════════════════════════════════════════════════
//  ResultStream
// ════════════════════════════════════════════════════════════════

/// Why a stream ended without exhausting its cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    Cancelled,
    ReadError,
}

/// `Created → Streaming → {Exhausted | Failed}`. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Created,
    Streaming,
    Exhausted,
    Failed(FailReason),
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamState::Exhausted | StreamState::Failed(_))
    }
}

/// Lazy, pull-based, forward-only sequence of records.
///
/// Header and meta are fixed at construction. The cursor is closed on the
/// first terminal transition, or when the stream is dropped.
pub struct ResultStream {
    header: Header,
    meta: Meta,
    cursor: Option<Box<dyn Cursor>>,
    cancel: CancellationToken,
    state: StreamState,
    /// One prefetched outcome: an item, or a read error to report once.
    pending: Option<Result<Box<dyn Record>>>,
    /// Set once the iterator has reported a cancellation.
    reported: bool,
}

impl std::fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStream")
            .field("header", &self.header)
            .field("meta", &self.meta)
            .field("state", &self.state)
            .finish()
    }
}

impl ResultStream {
    pub fn new(
        header: Header,
        meta: Meta,
        cursor: Box<dyn Cursor>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            header,
            meta,
            cursor: Some(cursor),
            cancel,
            state: StreamState::Created,
            pending: None,
            reported: false,
        }
    }

    /// Stream with no rows. Its first `has_next` is `false`.
    pub fn empty(header: Header, meta: Meta) -> Self {
        Self::new(header, meta, Box::new(VecCursor::default()), CancellationToken::new())
    }

    pub fn builder() -> ResultStreamBuilder {
        ResultStreamBuilder::default()
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Fire the stream's cancellation signal. Observed on the next pull.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// `true` if the next `next_record` call has an outcome to report:
    /// an item, or a read failure that has not been reported yet.
    pub fn has_next(&mut self) -> bool {
        self.advance();
        self.pending.is_some()
    }

    /// Pull the next record.
    ///
    /// A read failure is returned once as `StreamRead`; afterwards, and after
    /// exhaustion, every call fails with `StreamClosed` (`Cancelled` for a
    /// cancelled stream).
    pub fn next_record(&mut self) -> Result<Box<dyn Record>> {
        self.advance();
        match self.pending.take() {
            Some(outcome) => outcome,
            None => Err(self.terminal_error()),
        }
    }

    fn terminal_error(&self) -> DriverError {
        match self.state {
            StreamState::Failed(FailReason::Cancelled) => DriverError::cancelled(),
            _ => DriverError::stream_closed(),
        }
    }

    /// Fill `pending` from the cursor unless an outcome is already waiting
    /// or the stream is finished. Cancellation wins over a prefetched item.
    fn advance(&mut self) {
        if self.state.is_terminal() && !matches!(self.pending, Some(Err(_))) {
            return;
        }
        if self.cancel.is_cancelled() {
            if !self.state.is_terminal() {
                self.pending = None;
                self.finish(StreamState::Failed(FailReason::Cancelled));
            }
            return;
        }
        if self.pending.is_some() {
            return;
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return;
        };

        match cursor.fetch(&self.cancel) {
            Ok(Some(record)) => {
                self.state = StreamState::Streaming;
                self.pending = Some(Ok(record));
            }
            Ok(None) => self.finish(StreamState::Exhausted),
            Err(e) if e.kind() == ErrorKind::Cancelled || self.cancel.is_cancelled() => {
                self.finish(StreamState::Failed(FailReason::Cancelled));
            }
            Err(e) => {
                tracing::debug!(error = %e, "result stream read failed");
                self.finish(StreamState::Failed(FailReason::ReadError));
                self.pending = Some(Err(DriverError::stream_read(e)));
            }
        }
    }

    /// Terminal transition: record the state and release the cursor.
    fn finish(&mut self, state: StreamState) {
        self.state = state;
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
        }
    }
}

impl Iterator for ResultStream {
    type Item = Result<Box<dyn Record>>;

    /// Items in backend order, then at most one terminal error, then `None`.
    fn next(&mut self) -> Option<Self::Item> {
        self.advance();
        if let Some(outcome) = self.pending.take() {
            return Some(outcome);
        }
        if self.state == StreamState::Failed(FailReason::Cancelled) && !self.reported {
            self.reported = true;
            return Some(Err(DriverError::cancelled()));
        }
        None
    }
}

impl Drop for ResultStream {
    fn drop(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Builder
// ════════════════════════════════════════════════════════════════

/// Assembles a `ResultStream`. Missing header/meta default to an empty
/// header and tabular meta; a missing cursor yields an empty stream.
#[derive(Default)]
pub struct ResultStreamBuilder {
    header: Header,
    meta: Meta,
    cursor: Option<Box<dyn Cursor>>,
    cancel: Option<CancellationToken>,
}

impl ResultStreamBuilder {
    pub fn with_header(mut self, header: Header) -> Self {
        self.header = header;
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_cursor(mut self, cursor: Box<dyn Cursor>) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> ResultStream {
        ResultStream::new(
            self.header,
            self.meta,
            self.cursor.unwrap_or_else(|| Box::new(VecCursor::default())),
            self.cancel.unwrap_or_default(),
        )
    }
}
