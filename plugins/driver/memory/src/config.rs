use std::collections::BTreeMap;

// ════════════════════════════════════════════════════════════════
//  Configuration
// ════════════════════════════════════════════════════════════════

fn default_batch_size() -> usize {
    100
}

/// Options of the `memory` backend.
///
/// ```json
/// {"batch_size": 50, "databases": {"shop": {"orders": [{"id": 1}]}}}
/// ```
#[derive(Debug, serde::Deserialize)]
pub struct MemoryDriverConfig {
    /// Documents copied out of the store per cursor round trip.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Seed data: database → collection → documents.
    #[serde(default)]
    pub databases: BTreeMap<String, BTreeMap<String, Vec<serde_json::Value>>>,
}

impl Default for MemoryDriverConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            databases: BTreeMap::new(),
        }
    }
}
