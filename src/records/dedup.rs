use crate::common::types::Record;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, Serialize)]
pub struct DedupReport {
    pub original_count: usize,
    pub new_count: usize,
    /// Each id that occurred more than once, sorted and listed once.
    pub duplicate_ids: Vec<String>,
    #[serde(skip)]
    pub records: Vec<Record>,
}

impl DedupReport {
    pub fn removed(&self) -> usize {
        self.original_count - self.new_count
    }
}

fn id_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Keeps the first record for each value of `field`. Records without the
/// field (or with a null) are always kept.
pub fn dedup_by_field(records: Vec<Record>, field: &str) -> DedupReport {
    let original_count = records.len();
    let mut seen = HashSet::new();
    let mut duplicates = BTreeSet::new();
    let mut kept = Vec::with_capacity(records.len());

    for record in records {
        match record.get(field).and_then(id_key) {
            Some(id) => {
                if seen.insert(id.clone()) {
                    kept.push(record);
                } else {
                    duplicates.insert(id);
                }
            }
            None => kept.push(record),
        }
    }

    DedupReport {
        original_count,
        new_count: kept.len(),
        duplicate_ids: duplicates.into_iter().collect(),
        records: kept,
    }
}

pub fn unique_preserving_order<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let item = item.into();
        if seen.insert(item.clone()) {
            out.push(item);
        }
    }
    out
}
