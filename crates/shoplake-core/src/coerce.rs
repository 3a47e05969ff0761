//! Column cleaning and type coercion
//!
//! Identifier columns are trimmed and lower-cased so joins across tables do
//! not silently miss on whitespace or case. Text columns are trimmed. Numeric
//! and timestamp columns are parsed; a value that fails to parse becomes null
//! and is counted as a [`ValueCoercionGap`]. Blank strings are plain missing
//! values and are not counted.

use std::sync::Arc;

use arrow::array::{
    new_null_array, Array, ArrayRef, Float64Array, RecordBatch, StringArray,
    TimestampMicrosecondArray,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, TimeUnit};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::Result;
use crate::frame::with_column;
use crate::tables::TableSpec;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const MICROS: DataType = DataType::Timestamp(TimeUnit::Microsecond, None);

/// Cells of one column that could not be coerced and were set to missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueCoercionGap {
    pub table: String,
    pub column: String,
    /// Target type name ("Float64", "Timestamp")
    pub target: &'static str,
    pub count: usize,
}

/// Every coercion gap produced while cleaning one table.
#[derive(Debug, Clone, Default)]
pub struct CoercionReport {
    gaps: Vec<ValueCoercionGap>,
}

impl CoercionReport {
    pub fn gaps(&self) -> &[ValueCoercionGap] {
        &self.gaps
    }

    pub fn total(&self) -> usize {
        self.gaps.iter().map(|g| g.count).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.gaps.is_empty()
    }

    fn record(&mut self, table: &str, column: &str, target: &'static str, count: usize) {
        if count > 0 {
            self.gaps.push(ValueCoercionGap {
                table: table.to_string(),
                column: column.to_string(),
                target,
                count,
            });
        }
    }
}

/// Clean every declared column of `spec` present in `batch`.
///
/// Declared columns the batch does not carry are skipped; undeclared columns
/// pass through untouched. Applying this twice is a no-op the second time.
pub fn clean_columns(spec: &TableSpec, batch: &RecordBatch) -> Result<(RecordBatch, CoercionReport)> {
    let mut report = CoercionReport::default();
    let mut out = batch.clone();

    for name in spec.identifiers {
        if let Some(col) = out.column_by_name(name) {
            let cleaned = normalize_text(col, true)?;
            out = with_column(&out, name, cleaned)?;
        }
    }

    for name in spec.text {
        if let Some(col) = out.column_by_name(name) {
            let cleaned = normalize_text(col, false)?;
            out = with_column(&out, name, cleaned)?;
        }
    }

    for name in spec.numeric {
        if let Some(col) = out.column_by_name(name) {
            let (coerced, gaps) = to_float(col)?;
            report.record(spec.name, name, "Float64", gaps);
            out = with_column(&out, name, coerced)?;
        }
    }

    for name in spec.timestamps {
        if let Some(col) = out.column_by_name(name) {
            let (coerced, gaps) = to_timestamp(col)?;
            report.record(spec.name, name, "Timestamp", gaps);
            out = with_column(&out, name, coerced)?;
        }
    }

    Ok((out, report))
}

fn as_utf8(array: &ArrayRef) -> Result<ArrayRef> {
    if array.data_type() == &DataType::Utf8 {
        Ok(Arc::clone(array))
    } else {
        Ok(cast(array, &DataType::Utf8)?)
    }
}

fn utf8_values(array: &ArrayRef) -> Result<StringArray> {
    let utf8 = as_utf8(array)?;
    Ok(utf8
        .as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .unwrap_or_else(|| StringArray::new_null(utf8.len())))
}

/// Trim (and optionally lower-case) a column; blank values become null.
fn normalize_text(array: &ArrayRef, lowercase: bool) -> Result<ArrayRef> {
    let values = utf8_values(array)?;
    let cleaned: StringArray = values
        .iter()
        .map(|value| {
            value.map(str::trim).filter(|v| !v.is_empty()).map(|v| {
                if lowercase {
                    v.to_lowercase()
                } else {
                    v.to_string()
                }
            })
        })
        .collect();
    Ok(Arc::new(cleaned))
}

fn to_float(array: &ArrayRef) -> Result<(ArrayRef, usize)> {
    let data_type = array.data_type();
    if data_type == &DataType::Float64 {
        return Ok((Arc::clone(array), 0));
    }
    if data_type == &DataType::Null {
        return Ok((new_null_array(&DataType::Float64, array.len()), 0));
    }
    if data_type.is_numeric() || data_type == &DataType::Boolean {
        return Ok((cast(array, &DataType::Float64)?, 0));
    }

    let values = utf8_values(array)?;
    let mut gaps = 0;
    let parsed: Float64Array = values
        .iter()
        .map(|value| {
            let value = value.map(str::trim).filter(|v| !v.is_empty())?;
            match value.parse::<f64>() {
                Ok(v) if v.is_finite() => Some(v),
                _ => {
                    gaps += 1;
                    None
                }
            }
        })
        .collect();
    Ok((Arc::new(parsed), gaps))
}

fn to_timestamp(array: &ArrayRef) -> Result<(ArrayRef, usize)> {
    let data_type = array.data_type();
    if data_type == &MICROS {
        return Ok((Arc::clone(array), 0));
    }
    if data_type == &DataType::Null {
        return Ok((new_null_array(&MICROS, array.len()), 0));
    }
    if matches!(
        data_type,
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64
    ) {
        return Ok((cast(array, &MICROS)?, 0));
    }

    let values = utf8_values(array)?;
    let mut gaps = 0;
    let parsed: TimestampMicrosecondArray = values
        .iter()
        .map(|value| {
            let value = value.map(str::trim).filter(|v| !v.is_empty())?;
            let micros = parse_timestamp_micros(value);
            if micros.is_none() {
                gaps += 1;
            }
            micros
        })
        .collect();
    Ok((Arc::new(parsed), gaps))
}

/// Parse a timestamp string into microseconds since the epoch (UTC).
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` and its `T`-separated
/// variant, minute precision, and bare dates (midnight).
pub fn parse_timestamp_micros(value: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_micros());
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc().timestamp_micros());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_micros())
}
