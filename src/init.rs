// Initialization utilities for the pipeline binary
//
// Storage backend and logging/tracing setup

use anyhow::{Context, Result};
use opendal::Operator;
use shoplake_config::{DedupMode, LogFormat, RuntimeConfig, StorageBackend};
use shoplake_core::{DedupPolicy, ParquetOptions};
use shoplake_store::{operator_from_config, source_operator, Lake};
use tracing::info;

/// Open the lake described by the storage configuration
pub fn init_lake(config: &RuntimeConfig) -> Result<Lake> {
    match config.storage.backend {
        StorageBackend::Fs => {
            if let Some(fs) = config.storage.fs.as_ref() {
                info!("Using filesystem storage at: {}", fs.path);
            }
        }
        StorageBackend::S3 => {
            if let Some(s3) = config.storage.s3.as_ref() {
                info!(
                    "Using S3 storage: bucket={}, region={}",
                    s3.bucket, s3.region
                );
            }
        }
    }

    let op = operator_from_config(&config.storage).context("Failed to initialize storage")?;
    let parquet = ParquetOptions {
        row_group_size: config.storage.parquet_row_group_size,
    };
    Ok(Lake::new(op, parquet))
}

/// Operator rooted at the configured source directory
pub fn init_sources(config: &RuntimeConfig) -> Result<Operator> {
    source_operator(&config.source.path)
        .with_context(|| format!("Failed to open source directory '{}'", config.source.path))
}

pub fn dedup_policy(config: &RuntimeConfig) -> DedupPolicy {
    match config.pipeline.dedup_policy {
        DedupMode::LatestIngestion => DedupPolicy::LatestIngestion,
        DedupMode::FirstSeen => DedupPolicy::FirstSeen,
    }
}

/// Initialize tracing/logging from RuntimeConfig
pub fn init_tracing(config: &RuntimeConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Parse log level from config
    let env_filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Ignore the error if a subscriber is already installed
    let _ = match config.logging.format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}
