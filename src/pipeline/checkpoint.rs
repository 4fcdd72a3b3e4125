use crate::common::error::Result;
use crate::common::types::{load_records, record_identity, write_json_pretty, Record};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Output file doubling as resume marker. Every append rewrites the whole
/// array atomically.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    identity_fields: Vec<String>,
    records: Vec<Record>,
    ids: HashSet<String>,
}

impl CheckpointStore {
    /// Loads existing output. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>, identity_fields: &[String]) -> Self {
        let path = path.into();
        let records = if path.exists() {
            match load_records(&path) {
                Ok(records) => records,
                Err(e) => {
                    warn!("could not load checkpoint {}: {}; starting empty", path.display(), e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        let ids: HashSet<String> = records
            .iter()
            .filter_map(|r| record_identity(r, identity_fields))
            .collect();
        info!(
            "checkpoint {}: {} existing records, {} unique ids",
            path.display(),
            records.len(),
            ids.len()
        );
        Self {
            path,
            identity_fields: identity_fields.to_vec(),
            records,
            ids,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn append(&mut self, record: Record) -> Result<()> {
        if let Some(id) = record_identity(&record, &self.identity_fields) {
            self.ids.insert(id);
        }
        self.records.push(record);
        write_json_pretty(&self.path, &self.records)
    }

    /// Tracks `id` as done without it appearing in the record itself.
    pub fn mark(&mut self, id: impl Into<String>) {
        self.ids.insert(id.into());
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}
