//! shoplake-core - pure table transformations
//!
//! Cleaning, deduplication and mart aggregation over Arrow `RecordBatch`es,
//! plus the Parquet/CSV codecs every layer shares. Nothing in this crate
//! touches storage, a runtime or the clock; the store crate and the binary
//! wire it to the lake.

pub mod coerce;
pub mod dedup;
pub mod encoding;
pub mod error;
pub mod frame;
pub mod marts;
pub mod normalize;
pub mod provenance;
pub mod tables;

pub use coerce::{clean_columns, parse_timestamp_micros, CoercionReport, ValueCoercionGap};
pub use dedup::{deduplicate, Candidate, DedupPolicy, DedupStats};
pub use encoding::{
    decode_csv, decode_parquet, decode_source, encode_csv, encode_parquet, DecodedParquet,
    ParquetOptions, SourceFormat,
};
pub use error::{Result, TransformError};
pub use frame::concat_unified;
pub use marts::{MartKind, Snapshots};
pub use normalize::{normalize_partitions, Normalized};
pub use provenance::{append_provenance, Provenance};
pub use tables::{columns, TableSpec};

// Re-export arrow types for downstream crates
pub use arrow::array::RecordBatch;
