//! shoplake: layered batch pipeline over a partitioned Parquet lake
//!
//! Three externally triggered stages share one lake:
//! - ingest: source tables become write-once raw partitions
//! - normalize: all raw partitions of a table become one deduplicated snapshot
//! - aggregate: snapshots become curated marts
//!
//! The binary wires configuration, tracing and storage together; the stage
//! functions here only need a [`Lake`] and are exercised directly by tests.

pub mod aggregate;
pub mod context;
pub mod ingest;
mod init;
pub mod normalize;
pub mod partitions;

pub use aggregate::{aggregate, AggregationReport};
pub use context::RunContext;
pub use ingest::{ingest_all, ingest_table, IngestReport};
pub use init::{dedup_policy, init_lake, init_sources, init_tracing};
pub use normalize::{normalize_all, normalize_table, NormalizeOutcome, NormalizeReport};
pub use partitions::{list_partitions, render_partitions};

pub use shoplake_store::Lake;
