//! End-to-end pipeline tests against in-memory storage
//!
//! Every test wires a fresh lake and source directory onto OpenDAL's memory
//! service and drives the stages exactly as the binary does.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use arrow::array::{Array, Int64Array, StringArray, TimestampNanosecondArray};
use chrono::{TimeZone, Utc};
use opendal::{services, Operator};
use shoplake::{
    aggregate, ingest_all, ingest_table, normalize_all, normalize_table, Lake, RunContext,
};
use shoplake_config::SourceTableConfig;
use shoplake_core::frame::with_column;
use shoplake_core::{
    decode_parquet, encode_parquet, DedupPolicy, MartKind, ParquetOptions, RecordBatch, TableSpec,
};
use shoplake_store::{layout, ErrorCode};

const ORDERS_FILE: &str = "ecommerce/olist_orders_dataset.csv";
const HEADER: &str = "order_id,customer_id,order_status,order_purchase_timestamp,\
order_delivered_customer_date,order_estimated_delivery_date";

fn memory() -> Operator {
    Operator::new(services::Memory::default()).unwrap().finish()
}

struct Harness {
    lake: Lake,
    sources: Operator,
}

impl Harness {
    fn new() -> Self {
        Self {
            lake: Lake::new(memory(), ParquetOptions::default()),
            sources: memory(),
        }
    }

    async fn put_source(&self, path: &str, content: String) {
        self.sources.write(path, content.into_bytes()).await.unwrap();
    }

    async fn ingest_orders(&self, rows: &[String], hour: u32) -> shoplake_store::Result<String> {
        let mut content = format!("{}\n", HEADER);
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        self.put_source(ORDERS_FILE, content).await;
        let entry = ingest_table(&self.lake, &self.sources, &orders_source(), &run_at(hour)).await?;
        Ok(entry.path)
    }

    async fn read_object(&self, path: &str) -> Vec<u8> {
        self.lake.operator().read(path).await.unwrap().to_vec()
    }

    async fn read_mart(&self, mart: MartKind) -> RecordBatch {
        let bytes = self.lake.operator().read(&layout::mart_path(mart)).await.unwrap();
        decode_parquet(bytes.to_bytes()).unwrap().batch
    }
}

fn orders_source() -> SourceTableConfig {
    SourceTableConfig {
        table: "orders".to_string(),
        file: ORDERS_FILE.to_string(),
        data_source: "ecommerce".to_string(),
    }
}

fn orders_spec() -> &'static TableSpec {
    TableSpec::by_name("orders").unwrap()
}

fn run_at(hour: u32) -> RunContext {
    RunContext::at(Utc.with_ymd_and_hms(2024, 2, 1, hour, 0, 0).unwrap())
}

fn order_row(i: usize, status: &str) -> String {
    let day = i % 10 + 1;
    format!(
        "O{:03},c{:03},{},2024-01-{:02} 10:00:00,2024-01-{:02} 10:00:00,2024-01-{:02} 10:00:00",
        i,
        i,
        status,
        day,
        day + 3,
        day + 5
    )
}

fn order_rows(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| order_row(i, "delivered")).collect()
}

fn strings<'a>(batch: &'a RecordBatch, name: &str) -> &'a StringArray {
    batch
        .column_by_name(name)
        .unwrap()
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap()
}

#[tokio::test]
async fn partitions_of_100_50_and_1_duplicate_normalize_to_150_rows() {
    let h = Harness::new();
    h.ingest_orders(&order_rows(0..100), 8).await.unwrap();
    h.ingest_orders(&order_rows(100..150), 9).await.unwrap();
    h.ingest_orders(&[order_row(5, "canceled")], 10).await.unwrap();

    let outcome = normalize_table(&h.lake, orders_spec(), DedupPolicy::LatestIngestion)
        .await
        .unwrap();
    assert_eq!(outcome.partitions, 3);
    assert_eq!(outcome.raw_rows, 151);
    assert_eq!(outcome.rows, 150);
    assert_eq!(outcome.duplicates_removed, 1);

    let snapshot = h.lake.read_snapshot(orders_spec()).await.unwrap().unwrap();
    assert_eq!(snapshot.batch.num_rows(), 150);
    assert_eq!(snapshot.inputs.len(), 3);
    assert_eq!(snapshot.dedup_policy.as_deref(), Some("latest-ingestion"));

    // Identifiers are lower-cased and unique
    let ids = strings(&snapshot.batch, "order_id");
    let unique: HashSet<_> = ids.iter().flatten().collect();
    assert_eq!(unique.len(), 150);

    // The later ingestion wins for the duplicated key
    let statuses = strings(&snapshot.batch, "order_status");
    let o005 = (0..ids.len()).find(|&i| ids.value(i) == "o005").unwrap();
    assert_eq!(statuses.value(o005), "canceled");

    let report = aggregate(&h.lake, &[MartKind::OrdersByDay], false).await;
    assert!(report.is_success());
    assert_eq!(report.written.len(), 1);
    assert_eq!(report.written[0].csv_path, None);

    let mart = h.read_mart(MartKind::OrdersByDay).await;
    let counts = mart
        .column_by_name("orders_count")
        .unwrap()
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    let total: i64 = counts.iter().flatten().sum();
    assert_eq!(total, 150);
}

#[tokio::test]
async fn first_seen_keeps_the_earlier_row() {
    let h = Harness::new();
    h.ingest_orders(&order_rows(0..3), 8).await.unwrap();
    h.ingest_orders(&[order_row(1, "canceled")], 9).await.unwrap();

    normalize_table(&h.lake, orders_spec(), DedupPolicy::FirstSeen)
        .await
        .unwrap();
    let snapshot = h.lake.read_snapshot(orders_spec()).await.unwrap().unwrap();
    let statuses: Vec<_> = strings(&snapshot.batch, "order_status")
        .iter()
        .flatten()
        .collect();
    assert_eq!(statuses, vec!["delivered", "delivered", "delivered"]);
}

#[tokio::test]
async fn normalizing_twice_yields_identical_bytes() {
    let h = Harness::new();
    h.ingest_orders(&order_rows(0..20), 8).await.unwrap();
    h.ingest_orders(&order_rows(10..30), 9).await.unwrap();
    let path = layout::snapshot_path(orders_spec());

    normalize_table(&h.lake, orders_spec(), DedupPolicy::LatestIngestion)
        .await
        .unwrap();
    let first = h.read_object(&path).await;
    normalize_table(&h.lake, orders_spec(), DedupPolicy::LatestIngestion)
        .await
        .unwrap();
    let second = h.read_object(&path).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn ingestion_conserves_rows_and_never_overwrites() {
    let h = Harness::new();
    let path = h.ingest_orders(&order_rows(0..7), 8).await.unwrap();
    assert!(path.starts_with("raw/ecommerce/orders/ingestion_date=2024-02-01/orders_20240201_080000_000000"));

    let raw = decode_parquet(h.lake.operator().read(&path).await.unwrap().to_bytes())
        .unwrap()
        .batch;
    assert_eq!(raw.num_rows(), 7);
    // Source values are stored as loaded
    assert_eq!(strings(&raw, "order_id").value(0), "O000");
    assert_eq!(strings(&raw, "source_file").value(0), "olist_orders_dataset.csv");

    let err = h.ingest_orders(&order_rows(0..3), 8).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::E005WriteFailure);

    let entries = h.lake.partitions(orders_spec()).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].row_count, Some(7));
}

#[tokio::test]
async fn partitions_missing_from_the_manifest_are_normalized() {
    let h = Harness::new();
    h.ingest_orders(&order_rows(0..10), 8).await.unwrap();

    // A second partition copied in by other tooling, bypassing the manifest
    let other = Harness::new();
    let path = other.ingest_orders(&order_rows(10..20), 9).await.unwrap();
    let bytes = other.read_object(&path).await;
    h.lake.operator().write(&path, bytes).await.unwrap();

    let outcome = normalize_table(&h.lake, orders_spec(), DedupPolicy::LatestIngestion)
        .await
        .unwrap();
    assert_eq!(outcome.partitions, 2);
    assert_eq!(outcome.rows, 20);

    let snapshot = h.lake.read_snapshot(orders_spec()).await.unwrap().unwrap();
    assert!(snapshot.inputs.contains(&path));
}

#[tokio::test]
async fn legacy_partition_with_nanosecond_timestamps_normalizes() {
    let h = Harness::new();

    // Written before microsecond tags: seconds-only file name and a naive
    // nanosecond ingestion timestamp
    let legacy = Harness::new();
    let path = legacy
        .ingest_orders(&[order_row(1, "shipped")], 7)
        .await
        .unwrap();
    let batch = decode_parquet(legacy.lake.operator().read(&path).await.unwrap().to_bytes())
        .unwrap()
        .batch;
    let at = Utc.with_ymd_and_hms(2024, 2, 1, 7, 0, 0).unwrap();
    let nanos = TimestampNanosecondArray::from(vec![at.timestamp_nanos_opt().unwrap()]);
    let batch = with_column(&batch, "ingestion_timestamp", Arc::new(nanos)).unwrap();
    let bytes = encode_parquet(&batch, &ParquetOptions::default(), &BTreeMap::new()).unwrap();
    let legacy_path = "raw/ecommerce/orders/ingestion_date=2024-02-01/orders_20240201_070000.parquet";
    h.lake.operator().write(legacy_path, bytes).await.unwrap();

    h.ingest_orders(&[order_row(1, "canceled")], 8).await.unwrap();

    let outcome = normalize_table(&h.lake, orders_spec(), DedupPolicy::LatestIngestion)
        .await
        .unwrap();
    assert_eq!(outcome.partitions, 2);
    assert_eq!(outcome.rows, 1);
    assert_eq!(outcome.duplicates_removed, 1);

    let snapshot = h.lake.read_snapshot(orders_spec()).await.unwrap().unwrap();
    assert_eq!(snapshot.inputs[0], legacy_path);
    assert_eq!(strings(&snapshot.batch, "order_status").value(0), "canceled");
}

#[tokio::test]
async fn missing_snapshot_fails_only_dependent_marts() {
    let h = Harness::new();
    h.ingest_orders(&order_rows(0..10), 8).await.unwrap();
    normalize_table(&h.lake, orders_spec(), DedupPolicy::LatestIngestion)
        .await
        .unwrap();

    let report = aggregate(&h.lake, MartKind::all(), true).await;

    let written: HashSet<&str> = report.written.iter().map(|w| w.path.as_str()).collect();
    for mart in [
        MartKind::DimDate,
        MartKind::OrdersByDay,
        MartKind::OrderStatusShare,
        MartKind::DeliveryKpis,
    ] {
        assert!(written.contains(layout::mart_path(mart).as_str()), "{} not written", mart);
    }
    assert!(report
        .written
        .iter()
        .all(|w| w.csv_path.as_deref().is_some_and(|p| p.ends_with(".csv"))));

    assert_eq!(report.skipped, vec![MartKind::GeolocationByState]);

    let failed: Vec<MartKind> = report.failed.iter().map(|(m, _)| *m).collect();
    assert!(failed.contains(&MartKind::RevenueByDay));
    assert!(failed.contains(&MartKind::CustomersByState));
    assert!(failed.contains(&MartKind::RevenueByCategory));
    assert!(!failed.contains(&MartKind::OrdersByDay));
    for (_, err) in &report.failed {
        assert_eq!(err.code(), ErrorCode::E003MissingSnapshot);
    }
    assert_eq!(
        report.written.len() + report.skipped.len() + report.failed.len(),
        MartKind::all().len()
    );
}

#[tokio::test]
async fn normalize_without_raw_data() {
    let h = Harness::new();
    let err = normalize_table(&h.lake, orders_spec(), DedupPolicy::LatestIngestion)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::E002NoRawData);

    h.ingest_orders(&order_rows(0..4), 8).await.unwrap();
    let specs = vec![orders_spec(), TableSpec::by_name("customers").unwrap()];
    let report = normalize_all(&h.lake, &specs, DedupPolicy::LatestIngestion).await;
    assert!(report.is_success());
    assert_eq!(report.written.len(), 1);
    assert_eq!(report.skipped, vec!["customers"]);
}

#[tokio::test]
async fn missing_source_does_not_stop_other_sources() {
    let h = Harness::new();
    h.put_source(ORDERS_FILE, format!("{}\n{}\n", HEADER, order_row(1, "shipped")))
        .await;
    let tables = vec![
        SourceTableConfig {
            table: "customers".to_string(),
            file: "ecommerce/olist_customers_dataset.csv".to_string(),
            data_source: "ecommerce".to_string(),
        },
        orders_source(),
    ];

    let report = ingest_all(&h.lake, &h.sources, &tables, &run_at(8)).await;
    assert!(!report.is_success());
    assert_eq!(report.written.len(), 1);
    assert_eq!(report.failed.len(), 1);
    let (table, err) = &report.failed[0];
    assert_eq!(table, "customers");
    assert_eq!(err.code(), ErrorCode::E001MissingSource);
}
