//! Order volume marts

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, RecordBatch, StringArray};
use chrono::NaiveDate;

use super::{output, Snapshots, ORDER_PURCHASE_DATE};
use crate::error::Result;
use crate::frame::{date_array, date_of_micros, micros_at, str_at, strings, timestamps};
use crate::tables::columns;

/// Grouping key for an optional label that sorts missing values last.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Label(Option<String>);

impl Label {
    fn new(value: Option<&str>) -> Self {
        Label(value.map(str::to_string))
    }

    fn sort_key(&self) -> (bool, &str) {
        (self.0.is_none(), self.0.as_deref().unwrap_or_default())
    }
}

/// Order counts per purchase date and status.
///
/// Orders without a purchase date are excluded. A missing status is its own
/// group and sorts after every named status of the same day.
pub(super) fn orders_by_day(snapshots: &Snapshots) -> Result<RecordBatch> {
    let orders = snapshots.require("orders")?;
    let purchased = timestamps(orders, "orders", columns::PURCHASED_AT)?;
    let status = strings(orders, "orders", columns::ORDER_STATUS)?;

    let mut counts: HashMap<(NaiveDate, Label), i64> = HashMap::new();
    for row in 0..orders.num_rows() {
        let Some(date) = micros_at(purchased, row).and_then(date_of_micros) else {
            continue;
        };
        *counts.entry((date, Label::new(str_at(status, row)))).or_default() += 1;
    }

    let mut rows: Vec<_> = counts.into_iter().collect();
    rows.sort_by(|((da, la), _), ((db, lb), _)| da.cmp(db).then_with(|| la.sort_key().cmp(&lb.sort_key())));

    output(vec![
        (ORDER_PURCHASE_DATE, Arc::new(date_array(rows.iter().map(|((d, _), _)| *d)))),
        (
            columns::ORDER_STATUS,
            Arc::new(rows.iter().map(|((_, l), _)| l.0.clone()).collect::<StringArray>()),
        ),
        (
            "orders_count",
            Arc::new(rows.iter().map(|(_, c)| *c).collect::<Int64Array>()),
        ),
    ])
}

/// Share of each status in the whole order table, largest first.
///
/// Missing status counts as its own category so the shares sum to one.
pub(super) fn order_status_share(snapshots: &Snapshots) -> Result<RecordBatch> {
    let orders = snapshots.require("orders")?;
    let status = strings(orders, "orders", columns::ORDER_STATUS)?;

    let mut counts: BTreeMap<Label, i64> = BTreeMap::new();
    for row in 0..orders.num_rows() {
        *counts.entry(Label::new(str_at(status, row))).or_default() += 1;
    }
    let total = orders.num_rows() as f64;

    let mut rows: Vec<_> = counts.into_iter().collect();
    rows.sort_by(|(la, ca), (lb, cb)| cb.cmp(ca).then_with(|| la.sort_key().cmp(&lb.sort_key())));

    output(vec![
        (
            columns::ORDER_STATUS,
            Arc::new(rows.iter().map(|(l, _)| l.0.clone()).collect::<StringArray>()),
        ),
        (
            "orders_count",
            Arc::new(rows.iter().map(|(_, c)| *c).collect::<Int64Array>()),
        ),
        (
            "orders_share",
            Arc::new(
                rows.iter()
                    .map(|(_, c)| *c as f64 / total)
                    .collect::<Float64Array>(),
            ),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::frame::floats;
    use arrow::array::Array;

    fn with_status<'a>(id: &'a str, status: Option<&'a str>, purchased: Option<&'a str>) -> Order<'a> {
        Order {
            status,
            ..order(id, "c", purchased)
        }
    }

    #[test]
    fn counts_by_day_and_status_with_missing_last() {
        let batch = orders(&[
            with_status("a", Some("shipped"), Some("2018-01-02 10:00:00")),
            with_status("b", None, Some("2018-01-01 10:00:00")),
            with_status("c", Some("delivered"), Some("2018-01-01 11:00:00")),
            with_status("d", Some("delivered"), Some("2018-01-01 12:00:00")),
            with_status("e", Some("delivered"), None),
        ]);
        let mart = orders_by_day(&snapshots(vec![("orders", batch)])).unwrap();
        assert_eq!(mart.num_rows(), 3);

        let status = mart
            .column_by_name(columns::ORDER_STATUS)
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(status.value(0), "delivered");
        assert!(status.is_null(1));
        assert_eq!(status.value(2), "shipped");

        let counts = mart
            .column_by_name("orders_count")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(counts.values().to_vec(), vec![2, 1, 1]);
    }

    #[test]
    fn status_shares_sum_to_one() {
        let batch = orders(&[
            with_status("a", Some("delivered"), None),
            with_status("b", Some("delivered"), None),
            with_status("c", Some("canceled"), None),
            with_status("d", None, None),
        ]);
        let mart = order_status_share(&snapshots(vec![("orders", batch)])).unwrap();
        assert_eq!(mart.num_rows(), 3);

        let share = floats(&mart, "order_status_share", "orders_share").unwrap();
        let total: f64 = share.values().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(share.value(0), 0.5);

        let status = strings(&mart, "order_status_share", columns::ORDER_STATUS).unwrap();
        assert_eq!(status.value(0), "delivered");
        assert_eq!(status.value(1), "canceled");
        assert!(status.is_null(2));
    }

    #[test]
    fn empty_orders_give_empty_share() {
        let mart = order_status_share(&snapshots(vec![("orders", orders(&[]))])).unwrap();
        assert_eq!(mart.num_rows(), 0);
    }
}
