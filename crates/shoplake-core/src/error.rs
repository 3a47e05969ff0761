//! Error types for pure table transformations

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

/// Errors raised while reshaping, cleaning or aggregating Arrow batches.
///
/// Only structural problems end up here. A single cell that fails to coerce
/// is recorded in a [`crate::CoercionReport`] instead.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// A column required by the transformation is absent
    #[error("table '{table}' has no column '{column}'")]
    MissingColumn { table: String, column: String },

    /// A column exists but does not carry the type the step expects
    #[error("column '{column}' of table '{table}' is {actual}, expected {expected}")]
    UnexpectedType {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },

    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// A mart asked for a table that was never loaded
    #[error("no snapshot loaded for table '{0}'")]
    MissingInput(String),

    #[error("unknown mart '{0}'")]
    UnknownMart(String),

    #[error("unsupported source format for '{0}' (expected .csv or .parquet)")]
    UnsupportedFormat(String),
}

impl TransformError {
    pub fn missing_column(table: &str, column: &str) -> Self {
        Self::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;
