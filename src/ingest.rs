//! Ingestion stage: source tables to write-once raw partitions

use opendal::Operator;
use shoplake_config::SourceTableConfig;
use shoplake_core::{append_provenance, Provenance, TableSpec};
use shoplake_store::{read_source, Lake, PartitionEntry, StoreError};
use tracing::{error, info};

use crate::context::RunContext;

/// Outcome of ingesting several sources.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub written: Vec<PartitionEntry>,
    pub failed: Vec<(String, StoreError)>,
}

impl IngestReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Copy one source table into a new raw partition.
///
/// Rows are kept exactly as loaded; only the provenance columns are added.
pub async fn ingest_table(
    lake: &Lake,
    sources: &Operator,
    source: &SourceTableConfig,
    ctx: &RunContext,
) -> Result<PartitionEntry, StoreError> {
    let spec = TableSpec::by_name(&source.table)?;
    let batch = read_source(sources, &source.file).await?;

    let provenance = Provenance {
        ingested_at: ctx.started_at,
        source_file: source.file_name(),
        data_source: &source.data_source,
    };
    let stamped = append_provenance(&batch, &provenance)?;

    lake.write_raw_partition(spec, &stamped, &provenance).await
}

/// Ingest every listed source independently.
///
/// A failing source is logged and recorded; the others still run.
pub async fn ingest_all(
    lake: &Lake,
    sources: &Operator,
    tables: &[SourceTableConfig],
    ctx: &RunContext,
) -> IngestReport {
    let mut report = IngestReport::default();
    for source in tables {
        match ingest_table(lake, sources, source, ctx).await {
            Ok(entry) => report.written.push(entry),
            Err(e) => {
                error!(table = %source.table, code = e.code().as_str(), "Ingestion failed: {}", e);
                report.failed.push((source.table.clone(), e));
            }
        }
    }

    info!(
        run_id = %ctx.run_id,
        written = report.written.len(),
        failed = report.failed.len(),
        "Ingestion finished"
    );
    report
}
