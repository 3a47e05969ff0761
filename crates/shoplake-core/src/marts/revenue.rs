//! Revenue and payment marts

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, RecordBatch, StringArray};
use chrono::NaiveDate;

use super::{output, purchase_dates, sort_desc, Snapshots, ORDER_PURCHASE_DATE};
use crate::error::Result;
use crate::frame::{date_array, f64_at, maybe_floats, str_at, strings};
use crate::tables::columns;

/// Price plus freight of every item row; a missing part counts as zero.
fn item_totals(items: &RecordBatch) -> Result<Vec<f64>> {
    let price = maybe_floats(items, "items", columns::PRICE)?;
    let freight = maybe_floats(items, "items", columns::FREIGHT)?;
    Ok((0..items.num_rows())
        .map(|row| {
            price.and_then(|p| f64_at(p, row)).unwrap_or(0.0)
                + freight.and_then(|f| f64_at(f, row)).unwrap_or(0.0)
        })
        .collect())
}

fn daily_revenue(snapshots: &Snapshots) -> Result<BTreeMap<NaiveDate, f64>> {
    let items = snapshots.require("items")?;
    let dates = purchase_dates(snapshots.require("orders")?)?;
    let order_ids = strings(items, "items", columns::ORDER_ID)?;
    let totals = item_totals(items)?;

    let mut revenue = BTreeMap::new();
    for (row, total) in totals.into_iter().enumerate() {
        let Some(date) = str_at(order_ids, row).and_then(|id| dates.get(id)) else {
            continue;
        };
        *revenue.entry(*date).or_insert(0.0) += total;
    }
    Ok(revenue)
}

/// Item revenue per purchase date. Items whose order is unknown are dropped,
/// so every date here is also an order date.
pub(super) fn revenue_by_day(snapshots: &Snapshots) -> Result<RecordBatch> {
    let revenue = daily_revenue(snapshots)?;
    output(vec![
        (ORDER_PURCHASE_DATE, Arc::new(date_array(revenue.keys().copied()))),
        (
            "revenue",
            Arc::new(revenue.values().copied().collect::<Float64Array>()),
        ),
    ])
}

/// Average order value per purchase date.
///
/// `aov` is missing when the day has no counted orders.
pub(super) fn aov_by_day(snapshots: &Snapshots) -> Result<RecordBatch> {
    let revenue = daily_revenue(snapshots)?;
    let dates = purchase_dates(snapshots.require("orders")?)?;

    let mut orders_per_day: HashMap<NaiveDate, i64> = HashMap::new();
    for date in dates.values() {
        *orders_per_day.entry(*date).or_default() += 1;
    }

    let orders: Vec<Option<i64>> = revenue
        .keys()
        .map(|date| orders_per_day.get(date).copied())
        .collect();
    let aov: Float64Array = revenue
        .values()
        .zip(&orders)
        .map(|(revenue, orders)| per_order(*revenue, *orders))
        .collect();

    output(vec![
        (ORDER_PURCHASE_DATE, Arc::new(date_array(revenue.keys().copied()))),
        (
            "revenue",
            Arc::new(revenue.values().copied().collect::<Float64Array>()),
        ),
        ("orders", Arc::new(Int64Array::from(orders))),
        ("aov", Arc::new(aov)),
    ])
}

/// `total / orders`, missing when there is nothing finite to divide by.
fn per_order(total: f64, orders: Option<i64>) -> Option<f64> {
    match orders {
        Some(n) if n > 0 => Some(total / n as f64).filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Payment value per purchase date and payment type.
///
/// Rows without a payment type are excluded; a missing value adds zero.
pub(super) fn payment_mix_by_day(snapshots: &Snapshots) -> Result<RecordBatch> {
    let payments = snapshots.require("payments")?;
    let dates = purchase_dates(snapshots.require("orders")?)?;
    let order_ids = strings(payments, "payments", columns::ORDER_ID)?;
    let kinds = strings(payments, "payments", columns::PAYMENT_TYPE)?;
    let values = maybe_floats(payments, "payments", columns::PAYMENT_VALUE)?;

    let mut mix: BTreeMap<(NaiveDate, &str), f64> = BTreeMap::new();
    for row in 0..payments.num_rows() {
        let Some(date) = str_at(order_ids, row).and_then(|id| dates.get(id)) else {
            continue;
        };
        let Some(kind) = str_at(kinds, row) else {
            continue;
        };
        let value = values.and_then(|v| f64_at(v, row)).unwrap_or(0.0);
        *mix.entry((*date, kind)).or_insert(0.0) += value;
    }

    output(vec![
        (ORDER_PURCHASE_DATE, Arc::new(date_array(mix.keys().map(|(d, _)| *d)))),
        (
            columns::PAYMENT_TYPE,
            Arc::new(mix.keys().map(|(_, k)| Some(*k)).collect::<StringArray>()),
        ),
        (
            "payment_value_sum",
            Arc::new(mix.values().copied().collect::<Float64Array>()),
        ),
    ])
}

/// `raw category -> english category` when the translation table is loaded.
fn category_translations(snapshots: &Snapshots) -> Result<HashMap<&str, &str>> {
    let Some(categories) = snapshots.get("categories") else {
        return Ok(HashMap::new());
    };
    let raw = strings(categories, "categories", columns::CATEGORY)?;
    let english = strings(categories, "categories", columns::CATEGORY_ENGLISH)?;

    let mut translations = HashMap::with_capacity(categories.num_rows());
    for row in 0..categories.num_rows() {
        if let (Some(from), Some(to)) = (str_at(raw, row), str_at(english, row)) {
            translations.entry(from).or_insert(to);
        }
    }
    Ok(translations)
}

#[derive(Default)]
struct CategoryRevenue<'a> {
    revenue: f64,
    orders: HashSet<&'a str>,
}

/// Item revenue and distinct orders per product category, highest revenue
/// first.
///
/// Categories use their english name when a translation exists and the raw
/// name otherwise. Items without a known category are excluded.
pub(super) fn revenue_by_category(snapshots: &Snapshots) -> Result<RecordBatch> {
    let items = snapshots.require("items")?;
    let products = snapshots.require("products")?;
    let translations = category_translations(snapshots)?;

    let product_ids = strings(products, "products", columns::PRODUCT_ID)?;
    let product_categories = strings(products, "products", columns::CATEGORY)?;
    let mut category_of: HashMap<&str, &str> = HashMap::with_capacity(products.num_rows());
    for row in 0..products.num_rows() {
        if let (Some(id), Some(category)) = (str_at(product_ids, row), str_at(product_categories, row)) {
            let label = translations.get(category).copied().unwrap_or(category);
            category_of.entry(id).or_insert(label);
        }
    }

    let item_products = strings(items, "items", columns::PRODUCT_ID)?;
    let item_orders = strings(items, "items", columns::ORDER_ID)?;
    let totals = item_totals(items)?;

    let mut by_category: BTreeMap<&str, CategoryRevenue<'_>> = BTreeMap::new();
    for (row, total) in totals.into_iter().enumerate() {
        let Some(category) = str_at(item_products, row).and_then(|p| category_of.get(p)) else {
            continue;
        };
        let entry = by_category.entry(*category).or_default();
        entry.revenue += total;
        if let Some(order) = str_at(item_orders, row) {
            entry.orders.insert(order);
        }
    }

    let mut rows: Vec<(&str, f64)> = by_category
        .iter()
        .map(|(category, agg)| (*category, agg.revenue))
        .collect();
    sort_desc(&mut rows);

    output(vec![
        (
            "product_category",
            Arc::new(rows.iter().map(|(c, _)| Some(*c)).collect::<StringArray>()),
        ),
        (
            "revenue",
            Arc::new(rows.iter().map(|(_, r)| *r).collect::<Float64Array>()),
        ),
        (
            "orders_count",
            Arc::new(
                rows.iter()
                    .map(|(c, _)| by_category[c].orders.len() as i64)
                    .collect::<Int64Array>(),
            ),
        ),
    ])
}
