//! Error types for the lake store

use shoplake_core::TransformError;
use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Source table does not exist
    E001MissingSource,
    /// E002: No raw partition found for a table
    E002NoRawData,
    /// E003: Staging snapshot required by a mart is absent
    E003MissingSnapshot,
    /// E004: Configuration missing or invalid
    E004InvalidConfig,
    /// E005: Write operation failed
    E005WriteFailure,
    /// E006: Read operation failed
    E006ReadFailure,
    /// E007: Structural problem in table data
    E007Transform,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001MissingSource => "E001",
            Self::E002NoRawData => "E002",
            Self::E003MissingSnapshot => "E003",
            Self::E004InvalidConfig => "E004",
            Self::E005WriteFailure => "E005",
            Self::E006ReadFailure => "E006",
            Self::E007Transform => "E007",
        }
    }
}

/// Errors raised by lake reads and writes
#[derive(Debug, Error)]
pub enum StoreError {
    /// Source table does not exist
    #[error("[{code}] Source table not found: '{path}'")]
    MissingSource { code: &'static str, path: String },

    /// Table has no raw partition to normalize
    #[error("[{code}] No raw data for table '{table}' under '{dir}'")]
    NoRawData {
        code: &'static str,
        table: String,
        dir: String,
    },

    /// Snapshot required by a mart is absent
    #[error("[{code}] Staging snapshot for '{table}' not found at '{path}'")]
    MissingSnapshot {
        code: &'static str,
        table: String,
        path: String,
    },

    /// Invalid configuration provided
    #[error("[{code}] Invalid configuration: {message}")]
    InvalidConfig { code: &'static str, message: String },

    /// Write operation failed
    #[error("[{code}] Write operation failed: {message}")]
    WriteFailure { code: &'static str, message: String },

    /// Read operation failed
    #[error("[{code}] Read operation failed: {message}")]
    ReadFailure { code: &'static str, message: String },

    /// Data does not have the shape a step requires
    #[error("[{code}] {source}")]
    Transform {
        code: &'static str,
        #[source]
        source: TransformError,
    },
}

impl StoreError {
    pub fn missing_source(path: impl Into<String>) -> Self {
        Self::MissingSource {
            code: ErrorCode::E001MissingSource.as_str(),
            path: path.into(),
        }
    }

    pub fn no_raw_data(table: impl Into<String>, dir: impl Into<String>) -> Self {
        Self::NoRawData {
            code: ErrorCode::E002NoRawData.as_str(),
            table: table.into(),
            dir: dir.into(),
        }
    }

    pub fn missing_snapshot(table: impl Into<String>, path: impl Into<String>) -> Self {
        Self::MissingSnapshot {
            code: ErrorCode::E003MissingSnapshot.as_str(),
            table: table.into(),
            path: path.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            code: ErrorCode::E004InvalidConfig.as_str(),
            message: message.into(),
        }
    }

    pub fn write_failure(message: impl Into<String>) -> Self {
        Self::WriteFailure {
            code: ErrorCode::E005WriteFailure.as_str(),
            message: message.into(),
        }
    }

    pub fn read_failure(message: impl Into<String>) -> Self {
        Self::ReadFailure {
            code: ErrorCode::E006ReadFailure.as_str(),
            message: message.into(),
        }
    }

    /// Stable code of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingSource { .. } => ErrorCode::E001MissingSource,
            Self::NoRawData { .. } => ErrorCode::E002NoRawData,
            Self::MissingSnapshot { .. } => ErrorCode::E003MissingSnapshot,
            Self::InvalidConfig { .. } => ErrorCode::E004InvalidConfig,
            Self::WriteFailure { .. } => ErrorCode::E005WriteFailure,
            Self::ReadFailure { .. } => ErrorCode::E006ReadFailure,
            Self::Transform { .. } => ErrorCode::E007Transform,
        }
    }
}

impl From<TransformError> for StoreError {
    fn from(source: TransformError) -> Self {
        Self::Transform {
            code: ErrorCode::E007Transform.as_str(),
            source,
        }
    }
}

/// Result type alias for StoreError
pub type Result<T> = std::result::Result<T, StoreError>;
