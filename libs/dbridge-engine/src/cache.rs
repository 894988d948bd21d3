use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

use dbridge_api::{Document, Header, Meta, ResultStream, decode_binary};

use crate::error::EngineError;

/// Materialized query result: every row kept in the binary codec.
///
/// Filled from a `ResultStream`, paged back as decoded `Document`s and
/// persisted as one MessagePack value. Rows are stored as `bin` strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultCache {
    header: Header,
    meta: Meta,
    rows: Vec<ByteBuf>,
    complete: bool,
    #[serde(default)]
    max_rows: Option<usize>,
}

impl ResultCache {
    pub fn new(header: Header, meta: Meta) -> Self {
        Self { header, meta, ..Default::default() }
    }

    /// Stop filling after `max_rows` rows. The cache is then incomplete.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `true` once the source stream was drained to its end.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Drain `stream` into the cache. Returns the number of rows added.
    ///
    /// The first failure (read error, cancellation, encode error) is returned
    /// as is; rows cached before it stay readable.
    pub fn fill(&mut self, stream: &mut ResultStream) -> Result<usize, EngineError> {
        let before = self.rows.len();
        loop {
            if self.max_rows.is_some_and(|max| self.rows.len() >= max) {
                tracing::debug!(rows = self.rows.len(), "result cache row limit reached");
                break;
            }
            let Some(outcome) = stream.next() else {
                self.complete = true;
                break;
            };
            let bytes = outcome.and_then(|record| record.to_binary()).map_err(|e| {
                tracing::warn!(error = %e, cached = self.rows.len(), "result cache fill interrupted");
                e
            })?;
            self.rows.push(ByteBuf::from(bytes));
        }
        Ok(self.rows.len() - before)
    }

    /// Decoded rows `from..to`, clamped to what is cached.
    pub fn rows(&self, from: usize, to: usize) -> Result<Vec<Document>, EngineError> {
        let to = to.min(self.rows.len());
        let from = from.min(to);
        self.rows[from..to]
            .iter()
            .map(|bytes| decode_binary(bytes).map_err(EngineError::from))
            .collect()
    }

    /// Persist the whole cache as MessagePack.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), EngineError> {
        rmp_serde::encode::write_named(writer, self)?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, EngineError> {
        Ok(rmp_serde::decode::from_read(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use dbridge_api::{
        CancellationToken, Cursor, DriverError, Envelope, ErrorKind, Record, Result, SchemaType,
        VecCursor,
    };
    use serde_json::json;

    use super::*;

    fn stream_of(n: usize) -> ResultStream {
        let records: Vec<Box<dyn Record>> = (0..n).map(|i| Envelope::boxed(json!({"i": i}))).collect();
        ResultStream::builder()
            .with_header(Header::new(["Results"]))
            .with_meta(Meta::schema_less())
            .with_cursor(Box::new(VecCursor::new(records)))
            .build()
    }

    #[test]
    fn test_fill_and_page() {
        let mut stream = stream_of(5);
        let mut cache = ResultCache::new(stream.header().clone(), stream.meta().clone());
        assert_eq!(cache.fill(&mut stream).unwrap(), 5);
        assert!(cache.is_complete());
        assert_eq!(cache.len(), 5);

        let page = cache.rows(3, 100).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].value(), &json!({"i": 3}));
        assert!(cache.rows(10, 20).unwrap().is_empty());
        assert!(cache.rows(4, 2).unwrap().is_empty());
    }

    #[test]
    fn test_max_rows_leaves_cache_incomplete() {
        let mut stream = stream_of(10);
        let mut cache = ResultCache::new(Header::default(), Meta::default()).with_max_rows(4);
        assert_eq!(cache.fill(&mut stream).unwrap(), 4);
        assert!(!cache.is_complete());
        // remaining rows are still in the stream
        assert_eq!(stream.count(), 6);
    }

    #[test]
    fn test_read_error_keeps_cached_rows() {
        struct Flaky(usize);
        impl Cursor for Flaky {
            fn fetch(&mut self, _cancel: &CancellationToken) -> Result<Option<Box<dyn Record>>> {
                self.0 += 1;
                if self.0 > 2 {
                    return Err(DriverError::backend("lost connection"));
                }
                Ok(Some(Envelope::boxed(self.0)))
            }
            fn close(&mut self) {}
        }

        let mut stream = ResultStream::builder().with_cursor(Box::new(Flaky(0))).build();
        let mut cache = ResultCache::new(Header::default(), Meta::default());
        let err = cache.fill(&mut stream).unwrap_err();
        assert_eq!(err.driver_kind(), Some(ErrorKind::StreamRead));
        assert_eq!(cache.len(), 2);
        assert!(!cache.is_complete());
        assert_eq!(cache.rows(0, 2).unwrap()[1].value(), &json!(2));
    }

    #[test]
    fn test_cancelled_stream_fails_fill() {
        let mut stream = stream_of(3);
        stream.cancel();
        let mut cache = ResultCache::new(Header::default(), Meta::default());
        let err = cache.fill(&mut stream).unwrap_err();
        assert_eq!(err.driver_kind(), Some(ErrorKind::Cancelled));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_persist_and_restore() {
        let mut stream = stream_of(3);
        let mut cache = ResultCache::new(stream.header().clone(), stream.meta().clone());
        cache.fill(&mut stream).unwrap();

        let mut buf = Vec::new();
        cache.write_to(&mut buf).unwrap();
        let restored = ResultCache::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(restored, cache);
        assert_eq!(restored.meta().schema_type, SchemaType::SchemaLess);
        assert_eq!(restored.rows(0, 3).unwrap()[2].value(), &json!({"i": 2}));
    }

    #[test]
    fn test_rows_persist_as_byte_strings() {
        let mut stream = stream_of(2);
        let mut cache = ResultCache::new(Header::default(), Meta::default());
        cache.fill(&mut stream).unwrap();

        let mut buf = Vec::new();
        cache.write_to(&mut buf).unwrap();

        let row = Envelope::new(json!({"i": 1})).to_binary().unwrap();
        let mut bin = vec![0xc4, row.len() as u8];
        bin.extend_from_slice(&row);
        assert!(buf.windows(bin.len()).any(|w| w == bin.as_slice()));
    }

    #[test]
    fn test_read_from_garbage() {
        let err = ResultCache::read_from(&mut [0xc1u8, 0x00].as_slice()).unwrap_err();
        assert!(matches!(err, EngineError::Cache(_)));
    }
}
