// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::*;
use anyhow::{bail, Result};
use shoplake_core::TableSpec;
use std::collections::HashSet;
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_storage_config(&config.storage)?;
    validate_source_config(&config.source, &config.sources)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    if config.parquet_row_group_size == 0 {
        bail!("storage.parquet_row_group_size must be greater than 0");
    }

    // Warn about very large row groups
    if config.parquet_row_group_size > 1_000_000 {
        warn!(
            parquet_row_group_size = config.parquet_row_group_size,
            "storage.parquet_row_group_size is very large; readers may struggle"
        );
    }

    match config.backend {
        StorageBackend::Fs => {
            let fs = config
                .fs
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("fs storage backend requires 'fs' configuration"))?;

            if fs.path.is_empty() {
                bail!("storage.fs.path must not be empty");
            }
            if fs.atomic_write_dir.as_deref() == Some("") {
                bail!("storage.fs.atomic_write_dir must not be empty when set");
            }
        }
        StorageBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("s3 storage backend requires 's3' configuration"))?;

            if s3.bucket.is_empty() {
                bail!("storage.s3.bucket is required for S3 backend");
            }

            if s3.region.is_empty() {
                bail!("storage.s3.region is required for S3 backend");
            }
        }
    }

    Ok(())
}

fn validate_source_config(source: &SourceConfig, tables: &[SourceTableConfig]) -> Result<()> {
    if source.path.is_empty() {
        bail!("source.path must not be empty");
    }

    let mut seen = HashSet::new();
    for table in tables {
        if table.table.is_empty() {
            bail!("sources entries need a table name");
        }
        if TableSpec::by_name(&table.table).is_err() {
            let known: Vec<&str> = TableSpec::all().iter().map(|spec| spec.name).collect();
            bail!(
                "sources lists unknown table '{}' (known: {})",
                table.table,
                known.join(", ")
            );
        }
        if table.file.is_empty() {
            bail!("sources.{}.file must not be empty", table.table);
        }
        if table.data_source.is_empty() {
            bail!("sources.{}.data_source must not be empty", table.table);
        }
        if !seen.insert(table.table.as_str()) {
            bail!("sources lists table '{}' more than once", table.table);
        }
    }

    if tables.is_empty() {
        warn!("no source tables configured; ingest has nothing to do");
    }

    Ok(())
}

fn validate_logging_config(config: &LoggingConfig) -> Result<()> {
    if config.level.trim().is_empty() {
        bail!("logging.level must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_storage_config() {
        // Valid S3 config
        let s3_config = StorageConfig {
            backend: StorageBackend::S3,
            parquet_row_group_size: default_parquet_row_group_size(),
            fs: None,
            s3: Some(S3Config {
                bucket: "test-bucket".to_string(),
                region: "us-east-1".to_string(),
                endpoint: None,
                prefix: None,
            }),
        };
        assert!(validate_storage_config(&s3_config).is_ok());

        // Invalid S3 config (missing bucket)
        let invalid_s3 = StorageConfig {
            s3: Some(S3Config {
                bucket: String::new(),
                region: "us-east-1".to_string(),
                endpoint: None,
                prefix: None,
            }),
            ..s3_config.clone()
        };
        assert!(validate_storage_config(&invalid_s3).is_err());

        let zero_rows = StorageConfig {
            parquet_row_group_size: 0,
            ..StorageConfig::default()
        };
        assert!(validate_storage_config(&zero_rows).is_err());
    }

    #[test]
    fn test_duplicate_sources_rejected() {
        let mut config = RuntimeConfig::default();
        config.sources.push(config.sources[0].clone());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_empty_source_path_rejected() {
        let mut config = RuntimeConfig::default();
        config.source.path.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_unknown_source_table_rejected() {
        let mut config = RuntimeConfig::default();
        config.sources[0].table = "oders".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("unknown table 'oders'"));
    }
}
