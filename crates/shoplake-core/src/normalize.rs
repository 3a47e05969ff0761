//! Raw partitions to one cleaned, deduplicated table

use arrow::array::RecordBatch;
use tracing::debug;

use crate::coerce::{clean_columns, CoercionReport};
use crate::dedup::{deduplicate, DedupPolicy, DedupStats};
use crate::error::Result;
use crate::frame::concat_unified;
use crate::provenance::unify_ingestion_timestamp;
use crate::tables::TableSpec;

/// Result of normalizing one table.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub batch: RecordBatch,
    pub coercion: CoercionReport,
    pub dedup: DedupStats,
}

/// Concatenate `partitions` in the given order, clean, then deduplicate.
///
/// The caller decides partition order; deduplication only looks at it when
/// two rows of a key carry the same ingestion timestamp.
pub fn normalize_partitions(
    spec: &TableSpec,
    partitions: &[RecordBatch],
    policy: DedupPolicy,
) -> Result<Normalized> {
    let unified = partitions
        .iter()
        .map(unify_ingestion_timestamp)
        .collect::<Result<Vec<_>>>()?;
    let combined = concat_unified(&unified)?;
    let (cleaned, coercion) = clean_columns(spec, &combined)?;
    let (batch, dedup) = deduplicate(spec, &cleaned, policy)?;
    debug!(
        table = spec.name,
        partitions = partitions.len(),
        input_rows = dedup.input_rows,
        output_rows = dedup.output_rows,
        "normalized table"
    );
    Ok(Normalized {
        batch,
        coercion,
        dedup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;
    use crate::frame::strings;
    use crate::provenance::{append_provenance, Provenance};
    use arrow::array::{Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn partition(ids: &[&str], status: &str, hour: u32) -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("order_id", DataType::Utf8, true),
            Field::new("order_status", DataType::Utf8, true),
        ]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(ids.to_vec())),
                Arc::new(StringArray::from(vec![status; ids.len()])),
            ],
        )
        .unwrap();
        let provenance = Provenance {
            ingested_at: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
            source_file: "orders.csv",
            data_source: "ecommerce",
        };
        append_provenance(&batch, &provenance).unwrap()
    }

    #[test]
    fn overlapping_partitions_collapse_to_unique_keys() {
        let first: Vec<String> = (0..100).map(|i| format!("o{i}")).collect();
        let second: Vec<String> = (100..150).map(|i| format!("o{i}")).collect();
        let first: Vec<&str> = first.iter().map(String::as_str).collect();
        let second: Vec<&str> = second.iter().map(String::as_str).collect();

        let partitions = vec![
            partition(&first, "created", 1),
            partition(&second, "created", 2),
            partition(&["O7 "], "delivered", 3),
        ];
        let spec = TableSpec::by_name("orders").unwrap();
        let out = normalize_partitions(spec, &partitions, DedupPolicy::default()).unwrap();

        assert_eq!(out.batch.num_rows(), 150);
        assert_eq!(out.dedup.duplicates_removed, 1);

        let ids = strings(&out.batch, "orders", "order_id").unwrap();
        let unique: HashSet<_> = ids.iter().flatten().collect();
        assert_eq!(unique.len(), ids.len());

        // The later partition's row wins and keeps its own position
        let status = strings(&out.batch, "orders", "order_status").unwrap();
        let last = out.batch.num_rows() - 1;
        assert_eq!(ids.value(last), "o7");
        assert_eq!(status.value(last), "delivered");
        assert_eq!(ids.value(7), "o8");
    }

    #[test]
    fn missing_natural_key_column_is_structural() {
        let schema = Schema::new(vec![Field::new("status", DataType::Utf8, true)]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(StringArray::from(vec!["x"]))],
        )
        .unwrap();
        let spec = TableSpec::by_name("orders").unwrap();
        let err = normalize_partitions(spec, &[batch], DedupPolicy::default()).unwrap_err();
        assert!(matches!(err, TransformError::MissingColumn { .. }));
    }

    #[test]
    fn normalizing_is_deterministic() {
        let partitions = vec![partition(&["a", "b"], "x", 1), partition(&["b"], "y", 2)];
        let spec = TableSpec::by_name("orders").unwrap();
        let once = normalize_partitions(spec, &partitions, DedupPolicy::default()).unwrap();
        let again = normalize_partitions(spec, &partitions, DedupPolicy::default()).unwrap();
        assert_eq!(once.batch, again.batch);
        assert!(once.batch.column(0).null_count() == 0);
    }
}
