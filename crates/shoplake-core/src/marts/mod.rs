//! Curated marts
//!
//! Each mart answers one business question from the staging snapshots. All
//! marts of a run read from one shared [`Snapshots`] view, so every snapshot
//! is loaded and re-cleaned exactly once no matter how many marts use it.

mod calendar;
mod delivery;
mod geography;
mod orders;
mod revenue;
mod reviews;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{ArrayRef, RecordBatch};
use arrow::datatypes::{Field, Schema};
use chrono::NaiveDate;

use crate::coerce::{clean_columns, CoercionReport};
use crate::error::{Result, TransformError};
use crate::frame::{date_of_micros, micros_at, str_at, strings, timestamps};
use crate::tables::{columns, TableSpec};

pub(crate) const ORDER_PURCHASE_DATE: &str = "order_purchase_date";

/// Every mart the aggregation stage can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MartKind {
    DimDate,
    OrdersByDay,
    OrderStatusShare,
    DeliveryKpis,
    RevenueByDay,
    AovByDay,
    PaymentMixByDay,
    ReviewScoreByDay,
    CustomersByState,
    OrdersByState,
    DeliveryKpisByState,
    RevenueByCategory,
    GeolocationByState,
}

const ALL_MARTS: [MartKind; 13] = [
    MartKind::DimDate,
    MartKind::OrdersByDay,
    MartKind::OrderStatusShare,
    MartKind::DeliveryKpis,
    MartKind::RevenueByDay,
    MartKind::AovByDay,
    MartKind::PaymentMixByDay,
    MartKind::ReviewScoreByDay,
    MartKind::CustomersByState,
    MartKind::OrdersByState,
    MartKind::DeliveryKpisByState,
    MartKind::RevenueByCategory,
    MartKind::GeolocationByState,
];

impl MartKind {
    /// All marts in build order.
    pub fn all() -> &'static [MartKind] {
        &ALL_MARTS
    }

    pub fn name(&self) -> &'static str {
        match self {
            MartKind::DimDate => "dim_date",
            MartKind::OrdersByDay => "orders_by_day",
            MartKind::OrderStatusShare => "order_status_share",
            MartKind::DeliveryKpis => "delivery_kpis",
            MartKind::RevenueByDay => "revenue_by_day",
            MartKind::AovByDay => "aov_by_day",
            MartKind::PaymentMixByDay => "payment_mix_by_day",
            MartKind::ReviewScoreByDay => "review_score_by_day",
            MartKind::CustomersByState => "customers_by_state",
            MartKind::OrdersByState => "orders_by_state",
            MartKind::DeliveryKpisByState => "delivery_kpis_by_state",
            MartKind::RevenueByCategory => "revenue_by_category",
            MartKind::GeolocationByState => "geolocation_by_state",
        }
    }

    /// Curated domain the mart is written under.
    pub fn domain(&self) -> &'static str {
        "ecommerce"
    }

    /// Snapshots whose absence fails this mart.
    pub fn required_tables(&self) -> &'static [&'static str] {
        match self {
            MartKind::DimDate
            | MartKind::OrdersByDay
            | MartKind::OrderStatusShare
            | MartKind::DeliveryKpis => &["orders"],
            MartKind::RevenueByDay | MartKind::AovByDay => &["items", "orders"],
            MartKind::PaymentMixByDay => &["payments", "orders"],
            MartKind::ReviewScoreByDay => &["reviews", "orders"],
            MartKind::CustomersByState => &["customers"],
            MartKind::OrdersByState | MartKind::DeliveryKpisByState => &["orders", "customers"],
            MartKind::RevenueByCategory => &["items", "products"],
            MartKind::GeolocationByState => &[],
        }
    }

    /// Snapshots used when present and silently skipped when absent.
    pub fn optional_tables(&self) -> &'static [&'static str] {
        match self {
            MartKind::RevenueByCategory => &["categories"],
            MartKind::GeolocationByState => &["geolocation"],
            _ => &[],
        }
    }

    /// Build the mart from the shared view.
    ///
    /// Returns `Ok(None)` when the mart has no required input and none of
    /// its optional inputs are loaded.
    pub fn build(&self, snapshots: &Snapshots) -> Result<Option<RecordBatch>> {
        for table in self.required_tables() {
            snapshots.require(table)?;
        }
        if self.required_tables().is_empty()
            && !self.optional_tables().iter().any(|t| snapshots.contains(t))
        {
            return Ok(None);
        }

        let batch = match self {
            MartKind::DimDate => calendar::dim_date(snapshots)?,
            MartKind::OrdersByDay => orders::orders_by_day(snapshots)?,
            MartKind::OrderStatusShare => orders::order_status_share(snapshots)?,
            MartKind::DeliveryKpis => delivery::delivery_kpis(snapshots)?,
            MartKind::RevenueByDay => revenue::revenue_by_day(snapshots)?,
            MartKind::AovByDay => revenue::aov_by_day(snapshots)?,
            MartKind::PaymentMixByDay => revenue::payment_mix_by_day(snapshots)?,
            MartKind::ReviewScoreByDay => reviews::review_score_by_day(snapshots)?,
            MartKind::CustomersByState => geography::customers_by_state(snapshots)?,
            MartKind::OrdersByState => geography::orders_by_state(snapshots)?,
            MartKind::DeliveryKpisByState => delivery::delivery_kpis_by_state(snapshots)?,
            MartKind::RevenueByCategory => revenue::revenue_by_category(snapshots)?,
            MartKind::GeolocationByState => geography::geolocation_by_state(snapshots)?,
        };
        Ok(Some(batch))
    }
}

impl fmt::Display for MartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MartKind {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self> {
        ALL_MARTS
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| TransformError::UnknownMart(s.to_string()))
    }
}

/// Staging snapshots loaded for one aggregation run.
#[derive(Debug, Default)]
pub struct Snapshots {
    tables: BTreeMap<&'static str, RecordBatch>,
}

impl Snapshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a snapshot after re-applying the shared cleaning pass.
    pub fn insert(&mut self, spec: &'static TableSpec, batch: &RecordBatch) -> Result<CoercionReport> {
        let (cleaned, report) = clean_columns(spec, batch)?;
        self.tables.insert(spec.name, cleaned);
        Ok(report)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn get(&self, table: &str) -> Option<&RecordBatch> {
        self.tables.get(table)
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> + '_ {
        self.tables.keys().copied()
    }

    pub(crate) fn require(&self, table: &str) -> Result<&RecordBatch> {
        self.get(table)
            .ok_or_else(|| TransformError::MissingInput(table.to_string()))
    }
}

/// Purchase date of every order that has one.
///
/// Orders are unique on `order_id` after normalization; should a duplicate
/// slip through, the first row wins so joins never fan out.
pub(crate) fn purchase_dates(orders: &RecordBatch) -> Result<HashMap<&str, NaiveDate>> {
    let ids = strings(orders, "orders", columns::ORDER_ID)?;
    let purchased = timestamps(orders, "orders", columns::PURCHASED_AT)?;

    let mut dates = HashMap::with_capacity(orders.num_rows());
    for row in 0..orders.num_rows() {
        let (Some(id), Some(date)) = (
            str_at(ids, row),
            micros_at(purchased, row).and_then(date_of_micros),
        ) else {
            continue;
        };
        dates.entry(id).or_insert(date);
    }
    Ok(dates)
}

/// Assemble a mart batch; every output column is nullable.
pub(crate) fn output(columns: Vec<(&str, ArrayRef)>) -> Result<RecordBatch> {
    let fields = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect::<Vec<_>>();
    let arrays = columns.into_iter().map(|(_, array)| array).collect();
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Median; mean of the two middle values for an even count.
pub(crate) fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Sort `(label, count)` pairs by count descending, label ascending on ties.
pub(crate) fn sort_desc<K: Ord, V: PartialOrd>(rows: &mut [(K, V)]) {
    rows.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small hand-written snapshots shared by the mart tests.

    use super::*;
    use crate::coerce::parse_timestamp_micros;
    use arrow::array::{Float64Array, StringArray, TimestampMicrosecondArray};

    pub fn ts(value: Option<&str>) -> Option<i64> {
        value.map(|v| parse_timestamp_micros(v).unwrap())
    }

    pub fn strs(values: &[Option<&str>]) -> ArrayRef {
        Arc::new(StringArray::from(values.to_vec()))
    }

    pub fn nums(values: &[Option<f64>]) -> ArrayRef {
        Arc::new(Float64Array::from(values.to_vec()))
    }

    pub fn times(values: &[Option<&str>]) -> ArrayRef {
        Arc::new(TimestampMicrosecondArray::from(
            values.iter().map(|v| ts(*v)).collect::<Vec<_>>(),
        ))
    }

    pub struct Order<'a> {
        pub id: &'a str,
        pub customer: &'a str,
        pub status: Option<&'a str>,
        pub purchased: Option<&'a str>,
        pub delivered: Option<&'a str>,
        pub estimated: Option<&'a str>,
    }

    pub fn order<'a>(id: &'a str, customer: &'a str, purchased: Option<&'a str>) -> Order<'a> {
        Order {
            id,
            customer,
            status: Some("delivered"),
            purchased,
            delivered: None,
            estimated: None,
        }
    }

    pub fn orders(rows: &[Order<'_>]) -> RecordBatch {
        let ids: Vec<Option<&str>> = rows.iter().map(|r| Some(r.id)).collect();
        let customers: Vec<Option<&str>> = rows.iter().map(|r| Some(r.customer)).collect();
        let status: Vec<Option<&str>> = rows.iter().map(|r| r.status).collect();
        let purchased: Vec<Option<&str>> = rows.iter().map(|r| r.purchased).collect();
        let delivered: Vec<Option<&str>> = rows.iter().map(|r| r.delivered).collect();
        let estimated: Vec<Option<&str>> = rows.iter().map(|r| r.estimated).collect();
        output(vec![
            (columns::ORDER_ID, strs(&ids)),
            (columns::CUSTOMER_ID, strs(&customers)),
            (columns::ORDER_STATUS, strs(&status)),
            (columns::PURCHASED_AT, times(&purchased)),
            (columns::DELIVERED_AT, times(&delivered)),
            (columns::ESTIMATED_AT, times(&estimated)),
        ])
        .unwrap()
    }

    pub fn snapshots(tables: Vec<(&str, RecordBatch)>) -> Snapshots {
        let mut snapshots = Snapshots::new();
        for (name, batch) in tables {
            snapshots
                .insert(TableSpec::by_name(name).unwrap(), &batch)
                .unwrap();
        }
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn mart_names_round_trip() {
        for mart in MartKind::all() {
            assert_eq!(mart.name().parse::<MartKind>().unwrap(), *mart);
            assert_eq!(mart.domain(), "ecommerce");
        }
        assert!(matches!(
            "sales_forecast".parse::<MartKind>(),
            Err(TransformError::UnknownMart(_))
        ));
    }

    #[test]
    fn median_of_even_count_averages_middle_pair() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[5.0, 1.0, 3.0]), Some(3.0));
        assert_eq!(median(&[]), None);
        assert_eq!(mean(&[1.0, 2.0]), Some(1.5));
    }

    #[test]
    fn missing_required_snapshot_is_reported() {
        let snapshots = snapshots(vec![(
            "orders",
            orders(&[order("o1", "c1", Some("2018-01-01 10:00:00"))]),
        )]);
        let err = MartKind::RevenueByDay.build(&snapshots).unwrap_err();
        assert!(matches!(err, TransformError::MissingInput(ref t) if t == "items"));
        assert!(MartKind::OrdersByDay.build(&snapshots).unwrap().is_some());
    }

    #[test]
    fn optional_only_mart_is_skipped_without_input() {
        let snapshots = Snapshots::new();
        assert!(MartKind::GeolocationByState.build(&snapshots).unwrap().is_none());
    }

    #[test]
    fn snapshots_are_recleaned_on_insert() {
        let batch = orders(&[order(" O1 ", "C1", Some("2018-01-01 10:00:00"))]);
        let snapshots = snapshots(vec![("orders", batch)]);
        let dates = purchase_dates(snapshots.get("orders").unwrap()).unwrap();
        assert!(dates.contains_key("o1"));
    }
}
