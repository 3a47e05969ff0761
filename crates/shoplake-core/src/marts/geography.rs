//! Customer and location marts

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, RecordBatch, StringArray};

use super::{mean, output, sort_desc, Snapshots};
use crate::error::Result;
use crate::frame::{f64_at, maybe_floats, str_at, strings};
use crate::tables::columns;

/// `customer_id -> customer_state` for customers with a known state.
pub(super) fn customer_states(customers: &RecordBatch) -> Result<HashMap<&str, &str>> {
    let ids = strings(customers, "customers", columns::CUSTOMER_ID)?;
    let states = strings(customers, "customers", columns::CUSTOMER_STATE)?;

    let mut index = HashMap::with_capacity(customers.num_rows());
    for row in 0..customers.num_rows() {
        if let (Some(id), Some(state)) = (str_at(ids, row), str_at(states, row)) {
            index.entry(id).or_insert(state);
        }
    }
    Ok(index)
}

fn distinct_counts(groups: BTreeMap<&str, HashSet<&str>>) -> Vec<(String, i64)> {
    let mut rows: Vec<(String, i64)> = groups
        .into_iter()
        .map(|(state, members)| (state.to_string(), members.len() as i64))
        .collect();
    sort_desc(&mut rows);
    rows
}

fn state_counts(state_column: &str, count_column: &str, rows: &[(String, i64)]) -> Result<RecordBatch> {
    output(vec![
        (
            state_column,
            Arc::new(rows.iter().map(|(s, _)| Some(s.as_str())).collect::<StringArray>()),
        ),
        (
            count_column,
            Arc::new(rows.iter().map(|(_, n)| *n).collect::<Int64Array>()),
        ),
    ])
}

/// Distinct customers (by unique id) per state, largest first.
pub(super) fn customers_by_state(snapshots: &Snapshots) -> Result<RecordBatch> {
    let customers = snapshots.require("customers")?;
    let unique_ids = strings(customers, "customers", columns::CUSTOMER_UNIQUE_ID)?;
    let states = strings(customers, "customers", columns::CUSTOMER_STATE)?;

    let mut groups: BTreeMap<&str, HashSet<&str>> = BTreeMap::new();
    for row in 0..customers.num_rows() {
        let Some(state) = str_at(states, row) else {
            continue;
        };
        let members = groups.entry(state).or_default();
        if let Some(id) = str_at(unique_ids, row) {
            members.insert(id);
        }
    }

    state_counts(columns::CUSTOMER_STATE, "customers_count", &distinct_counts(groups))
}

/// Distinct orders per customer state, largest first.
///
/// Orders whose customer is unknown or has no state are excluded.
pub(super) fn orders_by_state(snapshots: &Snapshots) -> Result<RecordBatch> {
    let orders = snapshots.require("orders")?;
    let states = customer_states(snapshots.require("customers")?)?;
    let order_ids = strings(orders, "orders", columns::ORDER_ID)?;
    let customer_ids = strings(orders, "orders", columns::CUSTOMER_ID)?;

    let mut groups: BTreeMap<&str, HashSet<&str>> = BTreeMap::new();
    for row in 0..orders.num_rows() {
        let Some(state) = str_at(customer_ids, row).and_then(|c| states.get(c)) else {
            continue;
        };
        let members = groups.entry(*state).or_default();
        if let Some(id) = str_at(order_ids, row) {
            members.insert(id);
        }
    }

    state_counts(columns::CUSTOMER_STATE, "orders_count", &distinct_counts(groups))
}

#[derive(Default)]
struct StateGeo<'a> {
    zips: HashSet<&'a str>,
    lat: Vec<f64>,
    lng: Vec<f64>,
}

/// Zip-prefix coverage and mean coordinates per state.
pub(super) fn geolocation_by_state(snapshots: &Snapshots) -> Result<RecordBatch> {
    let geo = snapshots.require("geolocation")?;
    let zips = strings(geo, "geolocation", columns::GEO_ZIP)?;
    let states = strings(geo, "geolocation", columns::GEO_STATE)?;
    let lat = maybe_floats(geo, "geolocation", columns::GEO_LAT)?;
    let lng = maybe_floats(geo, "geolocation", columns::GEO_LNG)?;

    let mut by_state: BTreeMap<&str, StateGeo<'_>> = BTreeMap::new();
    for row in 0..geo.num_rows() {
        let Some(state) = str_at(states, row) else {
            continue;
        };
        let entry = by_state.entry(state).or_default();
        if let Some(zip) = str_at(zips, row) {
            entry.zips.insert(zip);
        }
        if let Some(v) = lat.and_then(|a| f64_at(a, row)) {
            entry.lat.push(v);
        }
        if let Some(v) = lng.and_then(|a| f64_at(a, row)) {
            entry.lng.push(v);
        }
    }

    let mut rows: Vec<(&str, i64)> = by_state
        .iter()
        .map(|(state, agg)| (*state, agg.zips.len() as i64))
        .collect();
    sort_desc(&mut rows);

    let avg_lat: Float64Array = rows.iter().map(|(s, _)| mean(&by_state[s].lat)).collect();
    let avg_lng: Float64Array = rows.iter().map(|(s, _)| mean(&by_state[s].lng)).collect();

    output(vec![
        (
            columns::GEO_STATE,
            Arc::new(rows.iter().map(|(s, _)| Some(*s)).collect::<StringArray>()),
        ),
        (
            "zip_prefixes",
            Arc::new(rows.iter().map(|(_, n)| *n).collect::<Int64Array>()),
        ),
        ("avg_lat", Arc::new(avg_lat)),
        ("avg_lng", Arc::new(avg_lng)),
    ])
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::frame::floats;

    fn customers() -> RecordBatch {
        output(vec![
            (
                columns::CUSTOMER_ID,
                strs(&[Some("c1"), Some("c2"), Some("c3"), Some("c4")]),
            ),
            (
                columns::CUSTOMER_UNIQUE_ID,
                strs(&[Some("u1"), Some("u1"), Some("u2"), Some("u3")]),
            ),
            (
                columns::CUSTOMER_STATE,
                strs(&[Some("RJ"), Some("RJ"), Some("SP"), None]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn customers_counted_by_unique_id() {
        let snapshots = snapshots(vec![("customers", customers())]);
        let mart = customers_by_state(&snapshots).unwrap();
        assert_eq!(mart.num_rows(), 2);

        let counts = mart
            .column_by_name("customers_count")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        // RJ has two customer ids but one person; tie broken by state name
        assert_eq!(counts.values().to_vec(), vec![1, 1]);
        let states = strings(&mart, "customers_by_state", columns::CUSTOMER_STATE).unwrap();
        assert_eq!(states.value(0), "RJ");
    }

    #[test]
    fn orders_follow_customer_state() {
        let batch = orders(&[
            order("a", "c1", None),
            order("b", "c2", None),
            order("c", "c3", None),
            order("d", "c4", None),
            order("e", "nobody", None),
        ]);
        let snapshots = snapshots(vec![("orders", batch), ("customers", customers())]);
        let mart = orders_by_state(&snapshots).unwrap();

        let states = strings(&mart, "orders_by_state", columns::CUSTOMER_STATE).unwrap();
        let counts = mart
            .column_by_name("orders_count")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(mart.num_rows(), 2);
        assert_eq!((states.value(0), counts.value(0)), ("RJ", 2));
        assert_eq!((states.value(1), counts.value(1)), ("SP", 1));
    }

    #[test]
    fn geolocation_summarised_per_state() {
        let geo = output(vec![
            (columns::GEO_ZIP, strs(&[Some("01001"), Some("01001"), Some("01002"), Some("20000")])),
            (columns::GEO_STATE, strs(&[Some("SP"), Some("SP"), Some("SP"), Some("RJ")])),
            (columns::GEO_LAT, nums(&[Some(-23.0), Some(-24.0), None, Some(-22.0)])),
            (columns::GEO_LNG, nums(&[Some(-46.0), Some(-46.0), Some(-47.0), Some(-43.0)])),
        ])
        .unwrap();
        let snapshots = snapshots(vec![("geolocation", geo)]);
        let mart = geolocation_by_state(&snapshots).unwrap();

        let states = strings(&mart, "geolocation_by_state", columns::GEO_STATE).unwrap();
        assert_eq!(states.value(0), "SP");
        let lat = floats(&mart, "geolocation_by_state", "avg_lat").unwrap();
        assert_eq!(lat.value(0), -23.5);
        let zips = mart
            .column_by_name("zip_prefixes")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(zips.value(0), 2);
    }
}
