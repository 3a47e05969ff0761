//! Partitioned Parquet lake for shoplake
//!
//! Owns the on-disk layout and everything that touches storage:
//! - raw partitions and their JSON manifests (`raw/`)
//! - staging snapshots with lineage metadata (`staging/`)
//! - curated marts and their CSV mirrors (`curated/`)
//!
//! All I/O goes through OpenDAL, so the same code runs against a local
//! directory, S3 or an in-memory operator in tests.

mod error;
pub mod lake;
pub mod layout;
pub mod manifest;
mod source;
mod storage;

pub use error::{ErrorCode, Result, StoreError};
pub use lake::{Lake, MartWrite, StagedSnapshot};
pub use manifest::{PartitionEntry, PartitionManifest};
pub use source::read_source;
pub use storage::{operator_from_config, source_operator};
