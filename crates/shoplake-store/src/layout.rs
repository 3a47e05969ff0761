//! Lake path layout
//!
//! ```text
//! raw/{raw_dir}/ingestion_date={YYYY-MM-DD}/{prefix}_{YYYYMMDD_HHMMSS_ffffff}.parquet
//! raw/{raw_dir}/_manifest.json
//! staging/{domain}/{table}/{table}_silver.parquet
//! curated/{domain}/{mart}.parquet
//! ```
//!
//! Paths are relative to the operator root and always use `/`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use shoplake_core::{MartKind, TableSpec};

pub const RAW_ROOT: &str = "raw";
pub const STAGING_ROOT: &str = "staging";
pub const CURATED_ROOT: &str = "curated";
pub const MANIFEST_FILE: &str = "_manifest.json";

const DATE_KEY: &str = "ingestion_date=";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";
const LEGACY_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Directory holding every raw partition of a table, with a trailing `/`.
pub fn raw_table_dir(spec: &TableSpec) -> String {
    format!("{}/{}/", RAW_ROOT, spec.raw_dir)
}

/// Path of a new raw partition written at `ingested_at`.
pub fn raw_partition_path(spec: &TableSpec, ingested_at: DateTime<Utc>) -> String {
    format!(
        "{}{}{}/{}_{}.parquet",
        raw_table_dir(spec),
        DATE_KEY,
        ingested_at.format("%Y-%m-%d"),
        spec.prefix,
        ingested_at.format(TIMESTAMP_FORMAT)
    )
}

pub fn manifest_path(spec: &TableSpec) -> String {
    format!("{}{}", raw_table_dir(spec), MANIFEST_FILE)
}

pub fn snapshot_path(spec: &TableSpec) -> String {
    format!(
        "{}/{}/{}/{}_silver.parquet",
        STAGING_ROOT, spec.domain, spec.name, spec.name
    )
}

pub fn mart_path(mart: MartKind) -> String {
    format!("{}/{}/{}.parquet", CURATED_ROOT, mart.domain(), mart.name())
}

/// CSV mirror next to a mart's Parquet file.
pub fn mart_csv_path(mart: MartKind) -> String {
    format!("{}/{}/{}.csv", CURATED_ROOT, mart.domain(), mart.name())
}

/// Ingestion date encoded in a Hive-style `ingestion_date=` path segment.
pub fn ingestion_date_of(path: &str) -> Option<NaiveDate> {
    path.split('/')
        .find_map(|segment| segment.strip_prefix(DATE_KEY))
        .and_then(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok())
}

/// Ingestion instant encoded in a partition file name.
///
/// Accepts microsecond tags and second-resolution tags written by older
/// tooling.
pub fn ingestion_timestamp_of(path: &str) -> Option<DateTime<Utc>> {
    let stem = path.rsplit('/').next()?.strip_suffix(".parquet")?;
    // prefix_YYYYMMDD_HHMMSS[_ffffff]; the prefix itself may contain '_'
    let parts: Vec<&str> = stem.rsplitn(4, '_').collect();
    let candidates = [
        parts.get(2).zip(parts.get(1)).zip(parts.first()).map(|((d, t), f)| {
            (format!("{}_{}_{}", d, t, f), TIMESTAMP_FORMAT)
        }),
        parts.get(1).zip(parts.first()).map(|(d, t)| (format!("{}_{}", d, t), LEGACY_TIMESTAMP_FORMAT)),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|(tag, format)| NaiveDateTime::parse_from_str(&tag, format).ok())
        .map(|naive| naive.and_utc())
}
