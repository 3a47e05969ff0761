//! Aggregation stage: staging snapshots to curated marts

use std::collections::{BTreeMap, BTreeSet};

use shoplake_core::{MartKind, Snapshots, TableSpec};
use shoplake_store::{layout, Lake, MartWrite, StoreError};
use tracing::{error, info, warn};

/// Outcome of one aggregation run.
#[derive(Debug, Default)]
pub struct AggregationReport {
    pub written: Vec<MartWrite>,
    /// Marts whose only inputs are optional tables that are absent
    pub skipped: Vec<MartKind>,
    pub failed: Vec<(MartKind, StoreError)>,
}

impl AggregationReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Why a snapshot could not be loaded.
enum Unavailable {
    Missing,
    Unreadable(String),
}

/// Build `marts` over one shared view of the staging snapshots.
///
/// Each snapshot is read once. A missing required snapshot fails only the
/// marts that need it.
pub async fn aggregate(lake: &Lake, marts: &[MartKind], mirror_csv: bool) -> AggregationReport {
    let (snapshots, unavailable) = load_snapshots(lake, marts).await;
    let mut report = AggregationReport::default();

    for &mart in marts {
        if let Some(err) = missing_input(mart, &unavailable) {
            error!(mart = mart.name(), code = err.code().as_str(), "Mart failed: {}", err);
            report.failed.push((mart, err));
            continue;
        }

        let built = match mart.build(&snapshots) {
            Ok(built) => built,
            Err(e) => {
                let err = StoreError::from(e);
                error!(mart = mart.name(), code = err.code().as_str(), "Mart failed: {}", err);
                report.failed.push((mart, err));
                continue;
            }
        };

        let Some(batch) = built else {
            info!(mart = mart.name(), "Optional inputs absent, skipping mart");
            report.skipped.push(mart);
            continue;
        };

        match lake.write_mart(mart, &batch, mirror_csv).await {
            Ok(written) => report.written.push(written),
            Err(e) => {
                error!(mart = mart.name(), code = e.code().as_str(), "Mart write failed: {}", e);
                report.failed.push((mart, e));
            }
        }
    }

    info!(
        written = report.written.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Aggregation finished"
    );
    report
}

async fn load_snapshots(
    lake: &Lake,
    marts: &[MartKind],
) -> (Snapshots, BTreeMap<&'static str, Unavailable>) {
    let tables: BTreeSet<&'static str> = marts
        .iter()
        .flat_map(|m| m.required_tables().iter().chain(m.optional_tables()))
        .copied()
        .collect();

    let mut snapshots = Snapshots::new();
    let mut unavailable = BTreeMap::new();

    for table in tables {
        let spec = match TableSpec::by_name(table) {
            Ok(spec) => spec,
            Err(e) => {
                unavailable.insert(table, Unavailable::Unreadable(e.to_string()));
                continue;
            }
        };

        let staged = match lake.read_snapshot(spec).await {
            Ok(Some(staged)) => staged,
            Ok(None) => {
                if spec.optional {
                    info!(table, "Optional snapshot absent");
                } else {
                    warn!(table, "Staging snapshot absent");
                }
                unavailable.insert(table, Unavailable::Missing);
                continue;
            }
            Err(e) => {
                warn!(table, "Failed to read snapshot: {}", e);
                unavailable.insert(table, Unavailable::Unreadable(e.to_string()));
                continue;
            }
        };

        match snapshots.insert(spec, &staged.batch) {
            Ok(report) => {
                for gap in report.gaps() {
                    warn!(
                        table,
                        column = %gap.column,
                        count = gap.count,
                        "Snapshot values could not be coerced"
                    );
                }
                tracing::debug!(table, rows = staged.batch.num_rows(), "Loaded snapshot");
            }
            Err(e) => {
                unavailable.insert(table, Unavailable::Unreadable(e.to_string()));
            }
        }
    }

    (snapshots, unavailable)
}

/// Error for the first required input of `mart` that could not be loaded.
fn missing_input(
    mart: MartKind,
    unavailable: &BTreeMap<&'static str, Unavailable>,
) -> Option<StoreError> {
    mart.required_tables().iter().find_map(|table| {
        let spec = TableSpec::by_name(table).ok()?;
        match unavailable.get(table)? {
            Unavailable::Missing => Some(StoreError::missing_snapshot(
                *table,
                layout::snapshot_path(spec),
            )),
            Unavailable::Unreadable(message) => Some(StoreError::read_failure(message.clone())),
        }
    })
}
