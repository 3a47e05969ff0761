//! Normalization stage: raw partitions to one staging snapshot per table

use shoplake_core::{normalize_partitions, DedupPolicy, RecordBatch, TableSpec};
use shoplake_store::{Lake, StoreError};
use tracing::{error, info, warn};

/// What one table's normalization produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeOutcome {
    pub table: &'static str,
    pub path: String,
    pub partitions: usize,
    pub raw_rows: usize,
    pub rows: usize,
    pub coercion_gaps: usize,
    pub duplicates_removed: usize,
    pub missing_key_rows: usize,
}

/// Outcome of normalizing several tables.
#[derive(Debug, Default)]
pub struct NormalizeReport {
    pub written: Vec<NormalizeOutcome>,
    /// Tables without any raw partition
    pub skipped: Vec<&'static str>,
    pub failed: Vec<(&'static str, StoreError)>,
}

impl NormalizeReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Rebuild a table's snapshot from all of its raw partitions.
pub async fn normalize_table(
    lake: &Lake,
    spec: &TableSpec,
    policy: DedupPolicy,
) -> Result<NormalizeOutcome, StoreError> {
    let partitions = lake.read_raw_partitions(spec).await?;
    let (entries, batches): (Vec<_>, Vec<RecordBatch>) = partitions.into_iter().unzip();

    let normalized = normalize_partitions(spec, &batches, policy)?;
    for gap in normalized.coercion.gaps() {
        warn!(
            table = %gap.table,
            column = %gap.column,
            target = gap.target,
            count = gap.count,
            "Values could not be coerced and were set to missing"
        );
    }
    if normalized.dedup.missing_key_rows > 0 {
        warn!(
            table = spec.name,
            rows = normalized.dedup.missing_key_rows,
            "Dropped rows without a natural key"
        );
    }

    let path = lake
        .write_snapshot(spec, &normalized.batch, &entries, policy)
        .await?;

    Ok(NormalizeOutcome {
        table: spec.name,
        path,
        partitions: entries.len(),
        raw_rows: normalized.dedup.input_rows,
        rows: normalized.batch.num_rows(),
        coercion_gaps: normalized.coercion.total(),
        duplicates_removed: normalized.dedup.duplicates_removed,
        missing_key_rows: normalized.dedup.missing_key_rows,
    })
}

/// Normalize each table in turn; tables never ingested are skipped.
pub async fn normalize_all(
    lake: &Lake,
    specs: &[&'static TableSpec],
    policy: DedupPolicy,
) -> NormalizeReport {
    let mut report = NormalizeReport::default();
    for spec in specs {
        match normalize_table(lake, spec, policy).await {
            Ok(outcome) => report.written.push(outcome),
            Err(StoreError::NoRawData { .. }) => {
                warn!(table = spec.name, "No raw data, skipping");
                report.skipped.push(spec.name);
            }
            Err(e) => {
                error!(table = spec.name, code = e.code().as_str(), "Normalization failed: {}", e);
                report.failed.push((spec.name, e));
            }
        }
    }

    info!(
        written = report.written.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Normalization finished"
    );
    report
}
