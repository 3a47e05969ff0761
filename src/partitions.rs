//! Listing of a table's raw partitions

use std::fmt::Write;

use shoplake_core::TableSpec;
use shoplake_store::{Lake, PartitionEntry, StoreError};

/// Raw partitions of `table` in concatenation order.
pub async fn list_partitions(lake: &Lake, table: &str) -> Result<Vec<PartitionEntry>, StoreError> {
    let spec = TableSpec::by_name(table)?;
    lake.partitions(spec).await
}

/// Plain-text table with one line per partition.
pub fn render_partitions(entries: &[PartitionEntry]) -> String {
    let path_width = entries
        .iter()
        .map(|e| e.path.len())
        .max()
        .unwrap_or(0)
        .max("path".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<10}  {:<27}  {:>8}  {:<path_width$}  {}",
        "date", "ingested_at", "rows", "path", "source_file"
    );
    for entry in entries {
        let rows = entry
            .row_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<10}  {:<27}  {:>8}  {:<path_width$}  {}",
            entry.ingestion_date,
            entry.ingestion_timestamp.format("%Y-%m-%dT%H:%M:%S%.6fZ"),
            rows,
            entry.path,
            entry.source_file
        );
    }
    out
}
