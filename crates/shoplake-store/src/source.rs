//! Reading source tables

use arrow::array::RecordBatch;
use opendal::{ErrorKind, Operator};
use shoplake_core::decode_source;

use crate::error::{Result, StoreError};

/// Load a source table as-is.
///
/// `path` is relative to the source operator root; its extension picks the
/// decoder.
pub async fn read_source(op: &Operator, path: &str) -> Result<RecordBatch> {
    let bytes = match op.read(path).await {
        Ok(buffer) => buffer.to_bytes(),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StoreError::missing_source(path));
        }
        Err(e) => {
            return Err(StoreError::read_failure(format!(
                "Failed to read source '{}': {}",
                path, e
            )));
        }
    };

    tracing::debug!(path, bytes = bytes.len(), "Read source table");
    Ok(decode_source(path, bytes)?)
}
