//! Partition manifest
//!
//! Every raw table keeps a JSON catalog of its partitions next to them.
//! Ingestion appends one entry after the partition itself is written, so a
//! crash between the two leaves an unlisted file rather than a dangling entry.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

pub const MANIFEST_VERSION: u32 = 1;

/// One raw partition of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionEntry {
    pub ingestion_date: NaiveDate,
    pub ingestion_timestamp: DateTime<Utc>,
    /// Path relative to the lake root
    pub path: String,
    /// Unknown for partitions discovered by scanning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(default)]
    pub source_file: String,
    #[serde(default)]
    pub data_source: String,
    /// blake3 hex digest of the Parquet bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

/// Catalog of a table's raw partitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionManifest {
    pub version: u32,
    pub table: String,
    #[serde(default)]
    pub partitions: Vec<PartitionEntry>,
}

impl PartitionManifest {
    pub fn new(table: &str) -> Self {
        Self {
            version: MANIFEST_VERSION,
            table: table.to_string(),
            partitions: Vec::new(),
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let manifest: Self = serde_json::from_slice(bytes)
            .map_err(|e| StoreError::read_failure(format!("invalid partition manifest: {}", e)))?;
        if manifest.version > MANIFEST_VERSION {
            return Err(StoreError::read_failure(format!(
                "partition manifest version {} is newer than supported version {}",
                manifest.version, MANIFEST_VERSION
            )));
        }
        Ok(manifest)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| StoreError::write_failure(format!("failed to encode manifest: {}", e)))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.partitions.iter().any(|p| p.path == path)
    }

    pub fn push(&mut self, entry: PartitionEntry) {
        self.partitions.push(entry);
    }
}

pub(crate) fn sort_entries(entries: &mut [PartitionEntry]) {
    entries.sort_by(|a, b| {
        a.ingestion_timestamp
            .cmp(&b.ingestion_timestamp)
            .then_with(|| a.path.cmp(&b.path))
    });
}
