use dbridge_api::{DriverError, Result};

// ════════════════════════════════════════════════════════════════
//  Query language
// ════════════════════════════════════════════════════════════════

/// A memory-backend query, written as a JSON object.
///
/// - `{"collection": "orders", "filter": {"customer.city": "Oslo"}, "limit": 10}`
/// - `{"insert": "orders", "documents": [{"id": 1}]}`
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(untagged)]
pub enum MemoryQuery {
    Insert {
        insert: String,
        documents: Vec<serde_json::Value>,
    },
    Find {
        collection: String,
        #[serde(default)]
        filter: serde_json::Map<String, serde_json::Value>,
        #[serde(default)]
        limit: Option<usize>,
    },
}

impl MemoryQuery {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text.trim())
            .map_err(|e| DriverError::query(format!("invalid memory query: {e}")))
    }
}

/// Resolve a dot-notation path: `"customer.city"` → `value["customer"]["city"]`.
pub fn resolve_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// `true` if every filter entry equals the value found at its path.
pub fn matches(document: &serde_json::Value, filter: &serde_json::Map<String, serde_json::Value>) -> bool {
    filter
        .iter()
        .all(|(path, expected)| resolve_path(document, path) == Some(expected))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_find() {
        let q = MemoryQuery::parse(r#"{"collection": "orders", "limit": 2}"#).unwrap();
        assert_eq!(
            q,
            MemoryQuery::Find { collection: "orders".into(), filter: Default::default(), limit: Some(2) }
        );
    }

    #[test]
    fn test_parse_insert() {
        let q = MemoryQuery::parse(r#"{"insert": "orders", "documents": [{"id": 1}]}"#).unwrap();
        assert!(matches!(q, MemoryQuery::Insert { ref insert, ref documents } if insert == "orders" && documents.len() == 1));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = MemoryQuery::parse("FOR d IN orders RETURN d").unwrap_err();
        assert_eq!(err.kind(), dbridge_api::ErrorKind::Query);
        assert!(MemoryQuery::parse(r#"{"limit": 3}"#).is_err());
    }

    #[test]
    fn test_filter_by_nested_path() {
        let doc = json!({"id": 7, "customer": {"city": "Oslo"}});
        let mut filter = serde_json::Map::new();
        filter.insert("customer.city".into(), json!("Oslo"));
        assert!(matches(&doc, &filter));

        filter.insert("id".into(), json!(8));
        assert!(!matches(&doc, &filter));
        assert!(matches(&doc, &serde_json::Map::new()));
    }

    #[test]
    fn test_resolve_missing_segment() {
        let doc = json!({"a": {"b": 1}});
        assert_eq!(resolve_path(&doc, "a.b"), Some(&json!(1)));
        assert_eq!(resolve_path(&doc, "a.c"), None);
        assert_eq!(resolve_path(&doc, "a.b.c"), None);
    }
}
