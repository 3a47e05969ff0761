//! Parquet and CSV encoding
//!
//! Parquet is the canonical serialization of every layer. CSV is accepted as a
//! source format and produced as an optional mirror of mart artifacts for
//! spreadsheet and BI tools.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::error::ArrowError;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;

use crate::error::{Result, TransformError};

pub const DEFAULT_ROW_GROUP_SIZE: usize = 32 * 1024;
const CSV_BATCH_SIZE: usize = 8 * 1024;

/// Knobs for Parquet output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParquetOptions {
    pub row_group_size: usize,
}

impl Default for ParquetOptions {
    fn default() -> Self {
        Self {
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }
}

/// Supported source table formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Parquet,
}

impl SourceFormat {
    pub fn from_path(path: &str) -> Result<Self> {
        let lower = path.to_lowercase();
        if lower.ends_with(".csv") {
            Ok(SourceFormat::Csv)
        } else if lower.ends_with(".parquet") {
            Ok(SourceFormat::Parquet)
        } else {
            Err(TransformError::UnsupportedFormat(path.to_string()))
        }
    }
}

fn compression_setting() -> Compression {
    ZstdLevel::try_new(2)
        .map(Compression::ZSTD)
        .unwrap_or(Compression::SNAPPY)
}

/// Writer properties shared by every layer.
///
/// - ZSTD(2) compression
/// - Dictionary encoding, page-level statistics
/// - Caller-supplied key/value metadata (lineage, table name)
pub fn writer_properties(options: &ParquetOptions, metadata: &BTreeMap<String, String>) -> WriterProperties {
    let mut key_values = vec![KeyValue {
        key: "shoplake.version".to_string(),
        value: Some(env!("CARGO_PKG_VERSION").to_string()),
    }];
    key_values.extend(metadata.iter().map(|(k, v)| KeyValue {
        key: k.clone(),
        value: Some(v.clone()),
    }));

    WriterProperties::builder()
        .set_dictionary_enabled(true)
        .set_statistics_enabled(EnabledStatistics::Page)
        .set_compression(compression_setting())
        .set_data_page_size_limit(256 * 1024)
        .set_write_batch_size(32 * 1024)
        .set_max_row_group_size(options.row_group_size.max(1))
        .set_dictionary_page_size_limit(128 * 1024)
        .set_key_value_metadata(Some(key_values))
        .build()
}

/// Encode a batch as a complete Parquet file in memory.
///
/// The whole file is produced before anything reaches storage, so a failed
/// encode never leaves a partial object behind.
pub fn encode_parquet(
    batch: &RecordBatch,
    options: &ParquetOptions,
    metadata: &BTreeMap<String, String>,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let props = writer_properties(options, metadata);
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(buffer)
}

/// A decoded Parquet file and its key/value metadata.
#[derive(Debug, Clone)]
pub struct DecodedParquet {
    pub batch: RecordBatch,
    pub metadata: BTreeMap<String, String>,
}

pub fn decode_parquet(bytes: Bytes) -> Result<DecodedParquet> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)?;
    let metadata = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .map(|kvs| {
            kvs.iter()
                .filter_map(|kv| kv.value.clone().map(|v| (kv.key.clone(), v)))
                .collect()
        })
        .unwrap_or_default();
    let schema = Arc::clone(builder.schema());
    let batches = builder
        .build()?
        .collect::<std::result::Result<Vec<_>, ArrowError>>()?;
    let batch = concat_batches(&schema, &batches)?;
    Ok(DecodedParquet { batch, metadata })
}

/// Decode a delimited text table with a header row, inferring column types.
pub fn decode_csv(bytes: &[u8]) -> Result<RecordBatch> {
    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(Cursor::new(bytes), None)?;
    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(Arc::clone(&schema))
        .with_header(true)
        .with_batch_size(CSV_BATCH_SIZE)
        .build(Cursor::new(bytes))?;
    let batches = reader.collect::<std::result::Result<Vec<_>, ArrowError>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

pub fn encode_csv(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().with_header(true).build(Vec::new());
    writer.write(batch)?;
    Ok(writer.into_inner())
}

/// Decode a source table in whichever format its path names.
pub fn decode_source(path: &str, bytes: Bytes) -> Result<RecordBatch> {
    match SourceFormat::from_path(path)? {
        SourceFormat::Csv => decode_csv(&bytes),
        SourceFormat::Parquet => Ok(decode_parquet(bytes)?.batch),
    }
}
