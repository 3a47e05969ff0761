//! Provenance columns stamped onto every ingested row

use std::sync::Arc;

use arrow::array::{
    ArrayRef, AsArray, Date32Array, RecordBatch, StringArray, TimestampMicrosecondArray,
};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use chrono::{DateTime, Utc};

use crate::coerce::parse_timestamp_micros;
use crate::error::Result;
use crate::frame::{date_to_days, timestamp_micros_utc, utc_micros, with_column};
use crate::tables::provenance::{DATA_SOURCE, INGESTION_DATE, INGESTION_TIMESTAMP, SOURCE_FILE};

/// Where and when a batch entered the lake.
#[derive(Debug, Clone, Copy)]
pub struct Provenance<'a> {
    pub ingested_at: DateTime<Utc>,
    /// File name of the source table
    pub source_file: &'a str,
    /// Originating system or domain (e.g. "ecommerce")
    pub data_source: &'a str,
}

/// Append the four provenance columns, leaving every source row untouched.
///
/// A source column already using one of the provenance names is overwritten
/// in place.
pub fn append_provenance(batch: &RecordBatch, provenance: &Provenance<'_>) -> Result<RecordBatch> {
    let rows = batch.num_rows();
    let micros = provenance.ingested_at.timestamp_micros();
    let days = date_to_days(provenance.ingested_at.date_naive());

    let timestamp = TimestampMicrosecondArray::from(vec![micros; rows]).with_timezone("UTC");
    let date = Date32Array::from(vec![days; rows]);
    let source_file = StringArray::from(vec![provenance.source_file; rows]);
    let data_source = StringArray::from(vec![provenance.data_source; rows]);

    let out = with_column(batch, INGESTION_TIMESTAMP, Arc::new(timestamp))?;
    let out = with_column(&out, INGESTION_DATE, Arc::new(date))?;
    let out = with_column(&out, SOURCE_FILE, Arc::new(source_file))?;
    with_column(&out, DATA_SOURCE, Arc::new(data_source))
}

/// Ingestion timestamps as UTC microseconds, whatever unit or zone a
/// partition stored them in. Text is parsed; unparseable values become null.
pub fn ingestion_timestamps(array: &ArrayRef) -> Result<TimestampMicrosecondArray> {
    if let Some(micros) = timestamp_micros_utc(array) {
        return Ok(micros);
    }
    let text = cast(array, &DataType::Utf8)?;
    let micros: TimestampMicrosecondArray = text
        .as_string::<i32>()
        .iter()
        .map(|value| value.and_then(parse_timestamp_micros))
        .collect();
    Ok(micros.with_timezone("UTC"))
}

/// Rewrite the ingestion timestamp column of an older partition so it
/// concatenates cleanly with current ones.
pub fn unify_ingestion_timestamp(batch: &RecordBatch) -> Result<RecordBatch> {
    match batch.column_by_name(INGESTION_TIMESTAMP) {
        Some(array) if *array.data_type() != utc_micros() => {
            let micros = ingestion_timestamps(array)?;
            with_column(batch, INGESTION_TIMESTAMP, Arc::new(micros))
        }
        _ => Ok(batch.clone()),
    }
}
