//! Storage operator initialization
//!
//! Builds the OpenDAL operators the lake and the source reader go through.

use opendal::{services, Operator};
use shoplake_config::{StorageBackend, StorageConfig};

use crate::error::{Result, StoreError};

/// Build the lake operator described by the storage configuration.
///
/// Paths handed to the operator are lake-relative; the filesystem root or S3
/// prefix is applied here.
pub fn operator_from_config(config: &StorageConfig) -> Result<Operator> {
    let operator = match config.backend {
        StorageBackend::Fs => {
            let fs = config.fs.as_ref().ok_or_else(|| {
                StoreError::invalid_config("fs config required for filesystem backend")
            })?;

            let mut fs_builder = services::Fs::default().root(&fs.path);
            if let Some(dir) = &fs.atomic_write_dir {
                fs_builder = fs_builder.atomic_write_dir(dir);
            }

            Operator::new(fs_builder)
                .map_err(|e| {
                    StoreError::invalid_config(format!(
                        "Failed to create filesystem operator: {}",
                        e
                    ))
                })?
                .finish()
        }
        StorageBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| StoreError::invalid_config("s3 config required for S3 backend"))?;

            let mut s3_builder = services::S3::default()
                .bucket(&s3.bucket)
                .region(&s3.region);

            if let Some(endpoint) = &s3.endpoint {
                s3_builder = s3_builder.endpoint(endpoint);
            }
            if let Some(prefix) = &s3.prefix {
                s3_builder = s3_builder.root(prefix);
            }

            Operator::new(s3_builder)
                .map_err(|e| {
                    StoreError::invalid_config(format!("Failed to create S3 operator: {}", e))
                })?
                .finish()
        }
    };

    tracing::debug!(backend = %config.backend, "Storage operator initialized");
    Ok(operator)
}

/// Read-only operator rooted at the source directory.
pub fn source_operator(path: &str) -> Result<Operator> {
    if path.is_empty() {
        return Err(StoreError::invalid_config("source path must not be empty"));
    }
    let operator = Operator::new(services::Fs::default().root(path))
        .map_err(|e| {
            StoreError::invalid_config(format!(
                "Failed to create source operator for '{}': {}",
                path, e
            ))
        })?
        .finish();
    Ok(operator)
}
