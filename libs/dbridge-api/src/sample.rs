use std::collections::HashMap;

use crate::driver::Column;

/// Default number of records inspected by `ColumnSampler`.
pub const DEFAULT_SAMPLE_LIMIT: usize = 1000;
/// Default number of attribute names reported by `ColumnSampler`.
pub const DEFAULT_TOP_ATTRIBUTES: usize = 10;
/// Type tag for attributes of schema-less collections.
pub const SCHEMA_LESS_TYPE: &str = "collection";

/// Derives columns for collections without a fixed schema.
///
/// Attribute cardinality of such collections is unbounded, so only the first
/// `sample_limit` records are inspected and only the `top` most frequent
/// top-level attribute names are kept. The cut is made by count (descending,
/// name ascending on ties) and the result is sorted by name.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSampler {
    pub sample_limit: usize,
    pub top: usize,
}

impl Default for ColumnSampler {
    fn default() -> Self {
        Self { sample_limit: DEFAULT_SAMPLE_LIMIT, top: DEFAULT_TOP_ATTRIBUTES }
    }
}

impl ColumnSampler {
    pub fn sample<'a, I>(&self, records: I) -> Vec<Column>
    where
        I: IntoIterator<Item = &'a serde_json::Value>,
    {
        let mut counts: HashMap<&'a str, usize> = HashMap::new();
        for record in records.into_iter().take(self.sample_limit) {
            // Scalars and arrays have no attributes.
            let Some(object) = record.as_object() else {
                continue;
            };
            for key in object.keys() {
                *counts.entry(key.as_str()).or_default() += 1;
            }
        }

        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|(a_name, a_count), (b_name, b_count)| {
            b_count.cmp(a_count).then_with(|| a_name.cmp(b_name))
        });
        ranked.truncate(self.top);

        let mut names: Vec<&str> = ranked.into_iter().map(|(name, _)| name).collect();
        names.sort_unstable();
        names.into_iter().map(|name| Column::new(name, SCHEMA_LESS_TYPE)).collect()
    }
}
