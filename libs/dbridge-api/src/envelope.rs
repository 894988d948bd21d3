use std::fmt;

use serde::Serialize;

use crate::error::{DriverError, Result};

/// One backend-produced value as seen by the rest of the pipeline.
///
/// The concrete type stays hidden behind this trait: callers can only render
/// it. Display never fails; interchange and binary surface encode errors.
pub trait Record: Send + fmt::Debug {
    /// Human-readable indented text. Falls back to the value's debug form
    /// when structured formatting is not possible.
    fn display(&self) -> String;

    /// Self-describing structured bytes (JSON). Field names and nesting kept.
    fn to_interchange(&self) -> Result<Vec<u8>>;

    /// Compact bytes for caches and persistence (MessagePack, named fields).
    fn to_binary(&self) -> Result<Vec<u8>>;
}

impl fmt::Display for dyn Record + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Envelope around any serde-serializable backend value.
///
/// Adapters wrap whatever they fetched (a document, a row, a scalar) and hand
/// it out as `Box<dyn Record>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    value: T,
}

impl<T> Envelope<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Envelope<T>
where
    T: Serialize + fmt::Debug + Send + 'static,
{
    /// Box the envelope as an opaque record.
    pub fn boxed(value: T) -> Box<dyn Record> {
        Box::new(Self::new(value))
    }
}

impl<T> Record for Envelope<T>
where
    T: Serialize + fmt::Debug + Send,
{
    fn display(&self) -> String {
        match serde_json::to_string_pretty(&self.value) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(error = %e, "structured display failed, using debug form");
                format!("{:?}", self.value)
            }
        }
    }

    fn to_interchange(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.value)?)
    }

    fn to_binary(&self) -> Result<Vec<u8>> {
        // Encoded from the interchange form so decoding reproduces it exactly
        // (f32 widening, integer map keys).
        let value: serde_json::Value = serde_json::from_slice(&self.to_interchange()?)?;
        Ok(rmp_serde::to_vec_named(&value)?)
    }
}

/// Generic, backend-independent record. What decoding produces.
pub type Document = Envelope<serde_json::Value>;

/// Reconstruct a record from binary-codec bytes.
///
/// The result re-encodes to the same interchange form as the value that was
/// originally encoded. Byte-identity with the backend value is not promised.
pub fn decode_binary(bytes: &[u8]) -> Result<Document> {
    let value: serde_json::Value = rmp_serde::from_slice(bytes)?;
    Ok(Envelope::new(value))
}

/// Reconstruct a record from interchange bytes.
pub fn decode_interchange(bytes: &[u8]) -> Result<Document> {
    serde_json::from_slice(bytes)
        .map(Envelope::new)
        .map_err(|e| DriverError::decode(format!("interchange: {e}")).with_source(e))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;

    #[derive(Debug, Serialize)]
    struct Order {
        id: u64,
        amount: f64,
        customer: Customer,
        tags: Vec<String>,
    }

    #[derive(Debug, Serialize)]
    struct Customer {
        name: String,
        vip: bool,
    }

    fn sample_order() -> Order {
        Order {
            id: 17,
            amount: 99.5,
            customer: Customer { name: "Ada".into(), vip: true },
            tags: vec!["express".into(), "gift".into()],
        }
    }

    fn as_json(bytes: &[u8]) -> serde_json::Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_display_is_indented() {
        let record = Envelope::new(json!({"name": "Ada", "age": 36}));
        let text = record.display();
        assert!(text.contains('\n'));
        assert!(text.contains("  \"name\": \"Ada\""));
    }

    #[test]
    fn test_display_falls_back_to_debug() {
        let mut map = BTreeMap::new();
        map.insert((1, 2), "point");
        let record = Envelope::new(map);
        assert_eq!(record.display(), "{(1, 2): \"point\"}");
    }

    #[test]
    fn test_interchange_rejects_non_string_keys() {
        let mut map = BTreeMap::new();
        map.insert((1, 2), "point");
        let err = Envelope::new(map).to_interchange().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);
    }

    #[test]
    fn test_binary_roundtrip_matches_interchange_for_struct() {
        let record = Envelope::new(sample_order());
        let direct = record.to_interchange().unwrap();

        let decoded = decode_binary(&record.to_binary().unwrap()).unwrap();
        let via_binary = decoded.to_interchange().unwrap();

        assert_eq!(as_json(&direct), as_json(&via_binary));
        // preserve_order keeps field order, so bytes match too
        assert_eq!(direct, via_binary);
    }

    #[derive(Debug, Serialize)]
    struct Price {
        sku: &'static str,
        price: f32,
    }

    #[test]
    fn test_binary_roundtrip_keeps_f32_text() {
        let record = Envelope::new(Price { sku: "A-1", price: 0.1 });
        let direct = record.to_interchange().unwrap();
        assert_eq!(direct, br#"{"sku":"A-1","price":0.1}"#);

        let decoded = decode_binary(&record.to_binary().unwrap()).unwrap();
        assert_eq!(decoded.to_interchange().unwrap(), direct);
    }

    #[test]
    fn test_binary_roundtrip_integer_keys() {
        let mut map = BTreeMap::new();
        map.insert(1u32, "a");
        map.insert(20u32, "b");
        let record = Envelope::new(map);
        let direct = record.to_interchange().unwrap();

        let decoded = decode_binary(&record.to_binary().unwrap()).unwrap();
        assert_eq!(decoded.value(), &json!({"1": "a", "20": "b"}));
        assert_eq!(decoded.to_interchange().unwrap(), direct);
    }

    #[test]
    fn test_binary_roundtrip_nested_document() {
        let doc = json!({
            "_key": "42",
            "nested": {"deep": [1, -2, 3.25, null, {"x": "y"}]},
            "flag": false,
        });
        let record = Envelope::new(doc.clone());
        let decoded = decode_binary(&record.to_binary().unwrap()).unwrap();
        assert_eq!(decoded.value(), &doc);
    }

    #[test]
    fn test_binary_roundtrip_scalar() {
        let record = Envelope::new("just a string");
        let decoded = decode_binary(&record.to_binary().unwrap()).unwrap();
        assert_eq!(decoded.to_interchange().unwrap(), record.to_interchange().unwrap());
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let err = decode_binary(&[0xc1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_decode_interchange() {
        let doc = decode_interchange(br#"{"a":[1,2]}"#).unwrap();
        assert_eq!(doc.value(), &json!({"a": [1, 2]}));
        let err = decode_interchange(b"{oops").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_boxed_record_display_trait() {
        let record: Box<dyn Record> = Envelope::boxed(json!([1, 2]));
        assert_eq!(record.to_string(), record.display());
    }
}
