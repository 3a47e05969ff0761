//! Record batch plumbing shared by the cleaning and aggregation steps
//!
//! Raw partitions of the same table are not guaranteed to agree on a schema:
//! schema inference may type a column differently from one source file to
//! the next, and a later file may add a column. [`concat_unified`] lines them
//! up by column name before concatenating.

use std::sync::Arc;

use arrow::array::{
    new_null_array, Array, ArrayRef, AsArray, Date32Array, Float64Array, RecordBatch,
    StringArray, TimestampMicrosecondArray,
};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{
    DataType, Field, Schema, SchemaRef, TimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType,
};
use chrono::{DateTime, Datelike, NaiveDate};

use crate::error::{Result, TransformError};

/// Days between 0001-01-01 (CE day 1) and 1970-01-01.
const UNIX_EPOCH_FROM_CE: i32 = 719_163;

/// Concatenate batches whose schemas may differ.
///
/// Columns are matched by name and keep the order in which they first appear.
/// A column missing from a batch is null-filled. Timestamps that disagree on
/// unit or zone meet at UTC microseconds; any other type conflict is widened
/// to Utf8 so nothing is lost before coercion.
pub fn concat_unified(batches: &[RecordBatch]) -> Result<RecordBatch> {
    let schema = unified_schema(batches);
    let mut aligned = Vec::with_capacity(batches.len());

    for batch in batches {
        let rows = batch.num_rows();
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let array = match batch.column_by_name(field.name()) {
                Some(col) if col.data_type() == field.data_type() => Arc::clone(col),
                Some(col) => align(col, field.data_type())?,
                None => new_null_array(field.data_type(), rows),
            };
            arrays.push(array);
        }
        aligned.push(RecordBatch::try_new(Arc::clone(&schema), arrays)?);
    }

    Ok(concat_batches(&schema, &aligned)?)
}

fn unified_schema(batches: &[RecordBatch]) -> SchemaRef {
    let mut fields: Vec<(String, DataType)> = Vec::new();

    for batch in batches {
        for field in batch.schema().fields() {
            let incoming = field.data_type();
            match fields.iter_mut().find(|(name, _)| name == field.name()) {
                None => fields.push((field.name().clone(), incoming.clone())),
                Some((_, existing)) => {
                    if existing == incoming || *incoming == DataType::Null {
                        continue;
                    }
                    *existing = match (&*existing, incoming) {
                        (DataType::Null, _) => incoming.clone(),
                        (DataType::Timestamp(..), DataType::Timestamp(..)) => utc_micros(),
                        _ => DataType::Utf8,
                    };
                }
            }
        }
    }

    Arc::new(Schema::new(
        fields
            .into_iter()
            .map(|(name, data_type)| Field::new(name, data_type, true))
            .collect::<Vec<_>>(),
    ))
}

fn align(col: &ArrayRef, target: &DataType) -> Result<ArrayRef> {
    match (col.data_type(), target) {
        (DataType::Timestamp(..), DataType::Timestamp(..)) if *target == utc_micros() => {
            if let Some(micros) = timestamp_micros_utc(col) {
                return Ok(Arc::new(micros));
            }
        }
        // Zoned timestamps only format to text through a timezone database,
        // and every stored value is already an offset from the UTC epoch.
        (DataType::Timestamp(_, Some(_)), DataType::Utf8) => {
            if let Some(micros) = timestamp_micros_utc(col) {
                let naive: ArrayRef = Arc::new(micros.with_timezone_opt(None::<String>));
                return Ok(cast(&naive, target)?);
            }
        }
        _ => {}
    }
    Ok(cast(col, target)?)
}

/// `Timestamp(Microsecond, "UTC")`, the type every ingestion timestamp ends up as.
pub fn utc_micros() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

/// Rescale a timestamp array of any unit to UTC microseconds.
///
/// Stored values are epoch offsets, so a naive timestamp is read as UTC and
/// no timezone lookup happens. Returns `None` for non-timestamp arrays.
pub fn timestamp_micros_utc(array: &ArrayRef) -> Option<TimestampMicrosecondArray> {
    let DataType::Timestamp(unit, _) = array.data_type() else {
        return None;
    };
    let micros: TimestampMicrosecondArray = match unit {
        TimeUnit::Second => array
            .as_primitive::<TimestampSecondType>()
            .unary::<_, TimestampMicrosecondType>(|v| v.saturating_mul(1_000_000)),
        TimeUnit::Millisecond => array
            .as_primitive::<TimestampMillisecondType>()
            .unary::<_, TimestampMicrosecondType>(|v| v.saturating_mul(1_000)),
        TimeUnit::Microsecond => array
            .as_primitive::<TimestampMicrosecondType>()
            .unary::<_, TimestampMicrosecondType>(|v| v),
        TimeUnit::Nanosecond => array
            .as_primitive::<TimestampNanosecondType>()
            .unary::<_, TimestampMicrosecondType>(|v| v.div_euclid(1_000)),
    };
    Some(micros.with_timezone("UTC"))
}

/// Replace (or append) a column, keeping the position of an existing one.
pub fn with_column(batch: &RecordBatch, name: &str, array: ArrayRef) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    let field = Field::new(name, array.data_type().clone(), true);

    match schema.index_of(name) {
        Ok(idx) => {
            fields[idx] = field;
            columns[idx] = array;
        }
        Err(_) => {
            fields.push(field);
            columns.push(array);
        }
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

pub(crate) fn column<'a>(batch: &'a RecordBatch, table: &str, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| TransformError::missing_column(table, name))
}

fn downcast<'a, T: 'static>(
    array: &'a ArrayRef,
    table: &str,
    name: &str,
    expected: &str,
) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| TransformError::UnexpectedType {
            table: table.to_string(),
            column: name.to_string(),
            expected: expected.to_string(),
            actual: array.data_type().to_string(),
        })
}

pub(crate) fn strings<'a>(batch: &'a RecordBatch, table: &str, name: &str) -> Result<&'a StringArray> {
    downcast(column(batch, table, name)?, table, name, "Utf8")
}

pub(crate) fn floats<'a>(batch: &'a RecordBatch, table: &str, name: &str) -> Result<&'a Float64Array> {
    downcast(column(batch, table, name)?, table, name, "Float64")
}

/// Like [`floats`] but an absent column is `None` rather than an error.
pub(crate) fn maybe_floats<'a>(
    batch: &'a RecordBatch,
    table: &str,
    name: &str,
) -> Result<Option<&'a Float64Array>> {
    match batch.column_by_name(name) {
        Some(array) => downcast(array, table, name, "Float64").map(Some),
        None => Ok(None),
    }
}

pub(crate) fn timestamps<'a>(
    batch: &'a RecordBatch,
    table: &str,
    name: &str,
) -> Result<&'a TimestampMicrosecondArray> {
    downcast(column(batch, table, name)?, table, name, "Timestamp(Microsecond)")
}

/// Value at `idx` or `None` when null.
pub(crate) fn str_at(array: &StringArray, idx: usize) -> Option<&str> {
    array.is_valid(idx).then(|| array.value(idx))
}

pub(crate) fn f64_at(array: &Float64Array, idx: usize) -> Option<f64> {
    array.is_valid(idx).then(|| array.value(idx))
}

pub(crate) fn micros_at(array: &TimestampMicrosecondArray, idx: usize) -> Option<i64> {
    array.is_valid(idx).then(|| array.value(idx))
}

/// Calendar date (UTC) of a microsecond timestamp.
pub fn date_of_micros(micros: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_micros(micros).map(|dt| dt.date_naive())
}

/// Days since the Unix epoch, the Date32 representation.
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_FROM_CE
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_FROM_CE)
}

pub(crate) fn date_array(dates: impl IntoIterator<Item = NaiveDate>) -> Date32Array {
    Date32Array::from_iter_values(dates.into_iter().map(date_to_days))
}
