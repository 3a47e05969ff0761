//! Table catalog
//!
//! Every table the pipeline knows about is declared here once. The catalog is
//! the single place that decides where a table lives in the lake, which
//! columns identify a row, and how each column is cleaned.

use crate::error::{Result, TransformError};

/// Column names shared by the mart builders.
pub mod columns {
    pub const ORDER_ID: &str = "order_id";
    pub const CUSTOMER_ID: &str = "customer_id";
    pub const CUSTOMER_UNIQUE_ID: &str = "customer_unique_id";
    pub const CUSTOMER_STATE: &str = "customer_state";
    pub const ORDER_STATUS: &str = "order_status";
    pub const PURCHASED_AT: &str = "order_purchase_timestamp";
    pub const DELIVERED_AT: &str = "order_delivered_customer_date";
    pub const ESTIMATED_AT: &str = "order_estimated_delivery_date";
    pub const PRODUCT_ID: &str = "product_id";
    pub const CATEGORY: &str = "product_category_name";
    pub const CATEGORY_ENGLISH: &str = "product_category_name_english";
    pub const PRICE: &str = "price";
    pub const FREIGHT: &str = "freight_value";
    pub const PAYMENT_TYPE: &str = "payment_type";
    pub const PAYMENT_VALUE: &str = "payment_value";
    pub const REVIEW_SCORE: &str = "review_score";
    pub const GEO_ZIP: &str = "geolocation_zip_code_prefix";
    pub const GEO_STATE: &str = "geolocation_state";
    pub const GEO_LAT: &str = "geolocation_lat";
    pub const GEO_LNG: &str = "geolocation_lng";
}

/// Provenance columns appended by ingestion.
pub mod provenance {
    pub const INGESTION_TIMESTAMP: &str = "ingestion_timestamp";
    pub const INGESTION_DATE: &str = "ingestion_date";
    pub const SOURCE_FILE: &str = "source_file";
    pub const DATA_SOURCE: &str = "data_source";

    pub const ALL: [&str; 4] = [INGESTION_TIMESTAMP, INGESTION_DATE, SOURCE_FILE, DATA_SOURCE];
}

/// Static description of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    /// Logical table name, also the staging file stem
    pub name: &'static str,
    /// Business domain grouping staging and curated output
    pub domain: &'static str,
    /// Directory under `raw/` holding the table's partitions
    pub raw_dir: &'static str,
    /// File name prefix of raw partitions
    pub prefix: &'static str,
    /// Columns forming the natural key; empty means no deduplication
    pub natural_key: &'static [&'static str],
    /// Identifier columns: trimmed and lower-cased
    pub identifiers: &'static [&'static str],
    /// Categorical text columns: trimmed
    pub text: &'static [&'static str],
    /// Coerced to Float64
    pub numeric: &'static [&'static str],
    /// Coerced to Timestamp(Microsecond)
    pub timestamps: &'static [&'static str],
    /// Aggregation tolerates this table being absent
    pub optional: bool,
}

impl TableSpec {
    /// Look up a table by its logical name.
    pub fn by_name(name: &str) -> Result<&'static TableSpec> {
        TABLES
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| TransformError::UnknownTable(name.to_string()))
    }

    /// All known tables, in catalog order.
    pub fn all() -> &'static [TableSpec] {
        TABLES
    }

    pub fn has_natural_key(&self) -> bool {
        !self.natural_key.is_empty()
    }
}

const TABLES: &[TableSpec] = &[
    TableSpec {
        name: "orders",
        domain: "ecommerce",
        raw_dir: "ecommerce/orders",
        prefix: "orders",
        natural_key: &["order_id"],
        identifiers: &["order_id", "customer_id"],
        text: &["order_status"],
        numeric: &[],
        timestamps: &[
            "order_purchase_timestamp",
            "order_approved_at",
            "order_delivered_carrier_date",
            "order_delivered_customer_date",
            "order_estimated_delivery_date",
        ],
        optional: false,
    },
    TableSpec {
        name: "customers",
        domain: "ecommerce",
        raw_dir: "ecommerce/customers",
        prefix: "customers",
        natural_key: &["customer_id"],
        identifiers: &["customer_id", "customer_unique_id"],
        text: &["customer_zip_code_prefix", "customer_city", "customer_state"],
        numeric: &[],
        timestamps: &[],
        optional: false,
    },
    TableSpec {
        name: "items",
        domain: "ecommerce",
        raw_dir: "ecommerce/items",
        prefix: "items",
        natural_key: &["order_id", "order_item_id"],
        identifiers: &["order_id", "product_id", "seller_id"],
        text: &[],
        numeric: &["order_item_id", "price", "freight_value"],
        timestamps: &["shipping_limit_date"],
        optional: false,
    },
    TableSpec {
        name: "payments",
        domain: "ecommerce",
        raw_dir: "ecommerce/payments",
        prefix: "payments",
        natural_key: &["order_id", "payment_sequential"],
        identifiers: &["order_id"],
        text: &["payment_type"],
        numeric: &["payment_sequential", "payment_installments", "payment_value"],
        timestamps: &[],
        optional: false,
    },
    TableSpec {
        name: "reviews",
        domain: "ecommerce",
        raw_dir: "ecommerce/reviews",
        prefix: "reviews",
        natural_key: &["review_id", "order_id"],
        identifiers: &["review_id", "order_id"],
        text: &[],
        numeric: &["review_score"],
        timestamps: &["review_creation_date", "review_answer_timestamp"],
        optional: false,
    },
    TableSpec {
        name: "products",
        domain: "ecommerce",
        raw_dir: "ecommerce/products",
        prefix: "products",
        natural_key: &["product_id"],
        identifiers: &["product_id"],
        text: &["product_category_name"],
        numeric: &[
            "product_name_lenght",
            "product_description_lenght",
            "product_photos_qty",
            "product_weight_g",
            "product_length_cm",
            "product_height_cm",
            "product_width_cm",
        ],
        timestamps: &[],
        optional: false,
    },
    TableSpec {
        name: "sellers",
        domain: "ecommerce",
        raw_dir: "ecommerce/sellers",
        prefix: "sellers",
        natural_key: &["seller_id"],
        identifiers: &["seller_id"],
        text: &["seller_zip_code_prefix", "seller_city", "seller_state"],
        numeric: &[],
        timestamps: &[],
        optional: false,
    },
    TableSpec {
        name: "geolocation",
        domain: "ecommerce",
        raw_dir: "ecommerce/geolocation",
        prefix: "geolocation",
        // Many coordinates per zip prefix; rows are kept as ingested
        natural_key: &[],
        identifiers: &[],
        text: &[
            "geolocation_zip_code_prefix",
            "geolocation_city",
            "geolocation_state",
        ],
        numeric: &["geolocation_lat", "geolocation_lng"],
        timestamps: &[],
        optional: true,
    },
    TableSpec {
        name: "categories",
        domain: "ecommerce",
        raw_dir: "ecommerce/categories",
        prefix: "categories",
        natural_key: &["product_category_name"],
        identifiers: &[],
        text: &["product_category_name", "product_category_name_english"],
        numeric: &[],
        timestamps: &[],
        optional: true,
    },
    TableSpec {
        name: "marketing",
        domain: "marketing",
        raw_dir: "marketing",
        prefix: "marketing",
        natural_key: &[],
        identifiers: &[],
        text: &[],
        numeric: &[],
        timestamps: &[],
        optional: true,
    },
];
