//! Review score trend

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{Float64Array, RecordBatch};
use chrono::NaiveDate;

use super::{mean, output, purchase_dates, Snapshots, ORDER_PURCHASE_DATE};
use crate::error::Result;
use crate::frame::{date_array, f64_at, floats, str_at, strings};
use crate::tables::columns;

/// Mean review score per order purchase date. Reviews without a score or a
/// dated order are excluded.
pub(super) fn review_score_by_day(snapshots: &Snapshots) -> Result<RecordBatch> {
    let reviews = snapshots.require("reviews")?;
    let dates = purchase_dates(snapshots.require("orders")?)?;
    let order_ids = strings(reviews, "reviews", columns::ORDER_ID)?;
    let scores = floats(reviews, "reviews", columns::REVIEW_SCORE)?;

    let mut by_day: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for row in 0..reviews.num_rows() {
        let (Some(date), Some(score)) = (
            str_at(order_ids, row).and_then(|id| dates.get(id)),
            f64_at(scores, row),
        ) else {
            continue;
        };
        by_day.entry(*date).or_default().push(score);
    }

    output(vec![
        (ORDER_PURCHASE_DATE, Arc::new(date_array(by_day.keys().copied()))),
        (
            "avg_review_score",
            Arc::new(by_day.values().map(|s| mean(s)).collect::<Float64Array>()),
        ),
    ])
}
