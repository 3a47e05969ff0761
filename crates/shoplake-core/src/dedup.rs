//! Natural-key deduplication
//!
//! When the same key shows up more than once, which row survives is decided
//! by an explicit [`DedupPolicy`] comparator rather than by whatever order the
//! partitions happened to be listed in.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use arrow::array::{Array, Int64Array, RecordBatch, StringArray, UInt32Array};
use arrow::compute::{cast, take_record_batch};
use arrow::datatypes::{DataType, Int64Type};

use crate::error::{Result, TransformError};
use crate::frame::column;
use crate::provenance::ingestion_timestamps;
use crate::tables::{provenance, TableSpec};

const KEY_SEPARATOR: char = '\u{1f}';
const MISSING_PART: &str = "\u{0}";

/// Tie-break between rows sharing a natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupPolicy {
    /// Row from the most recent ingestion wins; within one ingestion the
    /// earliest row wins. Rows without an ingestion timestamp rank oldest.
    #[default]
    LatestIngestion,
    /// First row in concatenation order wins.
    FirstSeen,
}

/// A row competing for its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub position: usize,
    pub ingested_at: Option<i64>,
}

impl DedupPolicy {
    /// `Ordering::Greater` when `a` should be kept over `b`.
    pub fn compare(&self, a: &Candidate, b: &Candidate) -> Ordering {
        let earlier_first = b.position.cmp(&a.position);
        match self {
            DedupPolicy::LatestIngestion => a.ingested_at.cmp(&b.ingested_at).then(earlier_first),
            DedupPolicy::FirstSeen => earlier_first,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DedupPolicy::LatestIngestion => "latest-ingestion",
            DedupPolicy::FirstSeen => "first-seen",
        }
    }
}

impl fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DedupPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "latest-ingestion" | "latest" => Ok(DedupPolicy::LatestIngestion),
            "first-seen" | "first" => Ok(DedupPolicy::FirstSeen),
            other => Err(format!(
                "unsupported dedup policy: {}. Supported: latest-ingestion, first-seen",
                other
            )),
        }
    }
}

/// Row accounting for one deduplication pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DedupStats {
    pub input_rows: usize,
    pub output_rows: usize,
    pub duplicates_removed: usize,
    /// Rows dropped because every natural-key column was missing
    pub missing_key_rows: usize,
}

/// Keep one row per natural key of `spec`.
///
/// Tables without a natural key are returned unchanged. Surviving rows keep
/// their relative order.
pub fn deduplicate(
    spec: &TableSpec,
    batch: &RecordBatch,
    policy: DedupPolicy,
) -> Result<(RecordBatch, DedupStats)> {
    let input_rows = batch.num_rows();
    if !spec.has_natural_key() {
        let stats = DedupStats {
            input_rows,
            output_rows: input_rows,
            ..Default::default()
        };
        return Ok((batch.clone(), stats));
    }

    let key_parts = spec
        .natural_key
        .iter()
        .map(|name| key_strings(batch, spec.name, name))
        .collect::<Result<Vec<_>>>()?;
    let ingested_at = ingestion_micros(batch)?;

    let mut winners: HashMap<String, Candidate> = HashMap::new();
    let mut missing_key_rows = 0;

    for row in 0..input_rows {
        let Some(key) = composite_key(&key_parts, row) else {
            missing_key_rows += 1;
            continue;
        };
        let candidate = Candidate {
            position: row,
            ingested_at: ingested_at
                .as_ref()
                .and_then(|ts| ts.is_valid(row).then(|| ts.value(row))),
        };
        winners
            .entry(key)
            .and_modify(|current| {
                if policy.compare(&candidate, current) == Ordering::Greater {
                    *current = candidate;
                }
            })
            .or_insert(candidate);
    }

    let mut keep: Vec<u32> = winners.values().map(|c| c.position as u32).collect();
    keep.sort_unstable();
    let output = take_record_batch(batch, &UInt32Array::from(keep))?;

    let output_rows = output.num_rows();
    let stats = DedupStats {
        input_rows,
        output_rows,
        duplicates_removed: input_rows - missing_key_rows - output_rows,
        missing_key_rows,
    };
    Ok((output, stats))
}

fn key_strings(batch: &RecordBatch, table: &str, name: &str) -> Result<StringArray> {
    let array = column(batch, table, name)?;
    let utf8 = cast(array, &DataType::Utf8)?;
    utf8.as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .ok_or_else(|| TransformError::UnexpectedType {
            table: table.to_string(),
            column: name.to_string(),
            expected: "Utf8".to_string(),
            actual: utf8.data_type().to_string(),
        })
}

fn ingestion_micros(batch: &RecordBatch) -> Result<Option<Int64Array>> {
    let Some(array) = batch.column_by_name(provenance::INGESTION_TIMESTAMP) else {
        return Ok(None);
    };
    let micros = ingestion_timestamps(array)?;
    Ok(Some(micros.reinterpret_cast::<Int64Type>()))
}

fn composite_key(parts: &[StringArray], row: usize) -> Option<String> {
    if parts.iter().all(|p| p.is_null(row)) {
        return None;
    }
    let mut key = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push(KEY_SEPARATOR);
        }
        if part.is_valid(row) {
            key.push_str(part.value(row));
        } else {
            key.push_str(MISSING_PART);
        }
    }
    Some(key)
}
