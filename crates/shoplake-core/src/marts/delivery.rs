//! Delivery performance marts

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, RecordBatch, StringArray};

use super::geography::customer_states;
use super::{mean, median, output, sort_desc, Snapshots};
use crate::error::Result;
use crate::frame::{micros_at, str_at, strings, timestamps};
use crate::tables::columns;

const MICROS_PER_DAY: f64 = 86_400_000_000.0;

/// An order that has both a purchase and a customer delivery timestamp.
struct Delivered<'a> {
    order_id: Option<&'a str>,
    customer_id: Option<&'a str>,
    days: f64,
    late: bool,
}

/// Orders with a purchase and a delivery timestamp.
///
/// An order is late only when an estimate exists and delivery happened
/// strictly after it.
fn delivered_cohort(orders: &RecordBatch) -> Result<Vec<Delivered<'_>>> {
    let ids = strings(orders, "orders", columns::ORDER_ID)?;
    let customers = strings(orders, "orders", columns::CUSTOMER_ID)?;
    let purchased = timestamps(orders, "orders", columns::PURCHASED_AT)?;
    let delivered = timestamps(orders, "orders", columns::DELIVERED_AT)?;
    let estimated = timestamps(orders, "orders", columns::ESTIMATED_AT)?;

    let mut cohort = Vec::new();
    for row in 0..orders.num_rows() {
        let (Some(bought), Some(arrived)) = (micros_at(purchased, row), micros_at(delivered, row)) else {
            continue;
        };
        cohort.push(Delivered {
            order_id: str_at(ids, row),
            customer_id: str_at(customers, row),
            days: (arrived - bought) as f64 / MICROS_PER_DAY,
            late: micros_at(estimated, row).is_some_and(|due| arrived > due),
        });
    }
    Ok(cohort)
}

fn late_share(flags: impl ExactSizeIterator<Item = bool>) -> Option<f64> {
    let len = flags.len();
    (len > 0).then(|| flags.filter(|late| *late).count() as f64 / len as f64)
}

/// Single-row delivery summary. An empty cohort yields zero counts and
/// missing averages.
pub(super) fn delivery_kpis(snapshots: &Snapshots) -> Result<RecordBatch> {
    let orders = snapshots.require("orders")?;
    let cohort = delivered_cohort(orders)?;

    let days: Vec<f64> = cohort.iter().map(|d| d.days).collect();
    let late_orders = cohort.iter().filter(|d| d.late).count();

    output(vec![
        ("delivered_orders", Arc::new(Int64Array::from(vec![cohort.len() as i64]))),
        ("avg_delivery_days", Arc::new(Float64Array::from(vec![mean(&days)]))),
        ("median_delivery_days", Arc::new(Float64Array::from(vec![median(&days)]))),
        ("late_orders", Arc::new(Int64Array::from(vec![late_orders as i64]))),
        (
            "late_rate",
            Arc::new(Float64Array::from(vec![late_share(cohort.iter().map(|d| d.late))])),
        ),
    ])
}

#[derive(Default)]
struct StateDelivery<'a> {
    orders: HashSet<&'a str>,
    days: Vec<f64>,
    late: Vec<bool>,
}

/// Delivery summary per customer state, busiest state first.
///
/// Deliveries whose customer has no known state are excluded.
pub(super) fn delivery_kpis_by_state(snapshots: &Snapshots) -> Result<RecordBatch> {
    let orders = snapshots.require("orders")?;
    let states = customer_states(snapshots.require("customers")?)?;
    let cohort = delivered_cohort(orders)?;

    let mut by_state: BTreeMap<&str, StateDelivery<'_>> = BTreeMap::new();
    for delivery in &cohort {
        let Some(state) = delivery.customer_id.and_then(|c| states.get(c)) else {
            continue;
        };
        let entry = by_state.entry(*state).or_default();
        if let Some(id) = delivery.order_id {
            entry.orders.insert(id);
        }
        entry.days.push(delivery.days);
        entry.late.push(delivery.late);
    }

    let mut rows: Vec<(&str, i64)> = by_state
        .iter()
        .map(|(state, agg)| (*state, agg.orders.len() as i64))
        .collect();
    sort_desc(&mut rows);

    let avg: Float64Array = rows.iter().map(|(s, _)| mean(&by_state[s].days)).collect();
    let late: Float64Array = rows
        .iter()
        .map(|(s, _)| late_share(by_state[s].late.iter().copied()))
        .collect();

    output(vec![
        (
            columns::CUSTOMER_STATE,
            Arc::new(rows.iter().map(|(s, _)| Some(*s)).collect::<StringArray>()),
        ),
        (
            "delivered_orders",
            Arc::new(rows.iter().map(|(_, n)| *n).collect::<Int64Array>()),
        ),
        ("avg_delivery_days", Arc::new(avg)),
        ("late_rate", Arc::new(late)),
    ])
}
