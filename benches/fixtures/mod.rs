// Synthetic e-commerce tables for benchmarking
//
// Creates orders and order items batches with:
// - A configurable number of orders (10k, 100k, 500k)
// - Two items per order
// - A share of duplicated order ids across partitions

use arrow::array::{ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use chrono::{TimeZone, Utc};
use shoplake_core::{append_provenance, Provenance};
use std::sync::Arc;

const STATUSES: [&str; 4] = ["delivered", "shipped", "canceled", "invoiced"];

/// Workload size presets
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
pub enum WorkloadSize {
    Small,  // 10k orders
    Medium, // 100k orders
    Large,  // 500k orders
}

impl WorkloadSize {
    pub fn order_count(&self) -> usize {
        match self {
            WorkloadSize::Small => 10_000,
            WorkloadSize::Medium => 100_000,
            WorkloadSize::Large => 500_000,
        }
    }
}

fn timestamp(order: usize, offset_days: usize) -> String {
    let day = (order % 28) + 1;
    let hour = order % 24;
    format!("2024-01-{:02} {:02}:15:00", (day + offset_days).min(31), hour)
}

/// Raw orders rows `start..end`, stamped as ingested on `day` of January 2024.
pub fn orders_partition(start: usize, end: usize, day: u32) -> RecordBatch {
    let ids: Vec<String> = (start..end).map(|i| format!(" ORD{:08} ", i)).collect();
    let customers: Vec<String> = (start..end).map(|i| format!("cust{:06}", i % 50_000)).collect();
    let statuses: Vec<&str> = (start..end).map(|i| STATUSES[i % STATUSES.len()]).collect();
    let purchased: Vec<String> = (start..end).map(|i| timestamp(i, 0)).collect();
    let delivered: Vec<Option<String>> = (start..end)
        .map(|i| (i % 5 != 0).then(|| timestamp(i, 3 + i % 4)))
        .collect();
    let estimated: Vec<String> = (start..end).map(|i| timestamp(i, 5)).collect();

    let schema = Schema::new(vec![
        Field::new("order_id", DataType::Utf8, true),
        Field::new("customer_id", DataType::Utf8, true),
        Field::new("order_status", DataType::Utf8, true),
        Field::new("order_purchase_timestamp", DataType::Utf8, true),
        Field::new("order_delivered_customer_date", DataType::Utf8, true),
        Field::new("order_estimated_delivery_date", DataType::Utf8, true),
    ]);
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(ids)),
        Arc::new(StringArray::from_iter_values(customers)),
        Arc::new(StringArray::from(statuses)),
        Arc::new(StringArray::from_iter_values(purchased)),
        Arc::new(StringArray::from(delivered)),
        Arc::new(StringArray::from_iter_values(estimated)),
    ];
    stamp(
        RecordBatch::try_new(Arc::new(schema), columns).unwrap(),
        "olist_orders_dataset.csv",
        day,
    )
}

/// Two raw item rows per order in `start..end`.
pub fn items_partition(start: usize, end: usize) -> RecordBatch {
    let orders: Vec<String> = (start..end)
        .flat_map(|i| [format!("ord{:08}", i), format!("ord{:08}", i)])
        .collect();
    let item_ids: Vec<i64> = (start..end).flat_map(|_| [1, 2]).collect();
    let products: Vec<String> = (start..end)
        .flat_map(|i| [format!("prod{:05}", i % 3_000), format!("prod{:05}", (i + 7) % 3_000)])
        .collect();
    let prices: Vec<f64> = (start..end)
        .flat_map(|i| [10.0 + (i % 90) as f64, 4.5])
        .collect();
    let freight: Vec<Option<f64>> = (start..end).flat_map(|i| [Some(2.5), (i % 3 != 0).then_some(1.0)]).collect();

    let schema = Schema::new(vec![
        Field::new("order_id", DataType::Utf8, true),
        Field::new("order_item_id", DataType::Int64, true),
        Field::new("product_id", DataType::Utf8, true),
        Field::new("price", DataType::Float64, true),
        Field::new("freight_value", DataType::Float64, true),
    ]);
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(orders)),
        Arc::new(Int64Array::from(item_ids)),
        Arc::new(StringArray::from_iter_values(products)),
        Arc::new(Float64Array::from(prices)),
        Arc::new(Float64Array::from(freight)),
    ];
    stamp(
        RecordBatch::try_new(Arc::new(schema), columns).unwrap(),
        "olist_order_items_dataset.csv",
        1,
    )
}

fn stamp(batch: RecordBatch, source_file: &str, day: u32) -> RecordBatch {
    let provenance = Provenance {
        ingested_at: Utc.with_ymd_and_hms(2024, 1, day, 6, 0, 0).unwrap(),
        source_file,
        data_source: "ecommerce",
    };
    append_provenance(&batch, &provenance).unwrap()
}
