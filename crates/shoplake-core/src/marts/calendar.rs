//! Date dimension

use std::collections::BTreeSet;
use std::sync::Arc;

use arrow::array::{Int32Array, RecordBatch};
use chrono::{Datelike, NaiveDate};

use super::{output, Snapshots};
use crate::error::Result;
use crate::frame::{date_array, date_of_micros, timestamps};
use crate::tables::columns;

/// One row per distinct purchase date, ascending.
///
/// `weekday` counts from Monday = 0; `week` is the ISO week number.
pub(super) fn dim_date(snapshots: &Snapshots) -> Result<RecordBatch> {
    let orders = snapshots.require("orders")?;
    let purchased = timestamps(orders, "orders", columns::PURCHASED_AT)?;

    let dates: BTreeSet<NaiveDate> = purchased
        .iter()
        .flatten()
        .filter_map(date_of_micros)
        .collect();

    let part = |f: fn(&NaiveDate) -> i32| Arc::new(dates.iter().map(f).collect::<Int32Array>());

    output(vec![
        ("date", Arc::new(date_array(dates.iter().copied()))),
        ("year", part(|d| d.year())),
        ("month", part(|d| d.month() as i32)),
        ("day", part(|d| d.day() as i32)),
        ("week", part(|d| d.iso_week().week() as i32)),
        ("weekday", part(|d| d.weekday().num_days_from_monday() as i32)),
    ])
}
