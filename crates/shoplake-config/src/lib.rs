// shoplake-config - Layered configuration for the pipeline binary
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority, SHOPLAKE_* prefix)
// 2. Config file given on the command line (--config)
// 3. Config file path from SHOPLAKE_CONFIG env var
// 4. Config file contents from SHOPLAKE_CONFIG_CONTENT env var
// 5. Default config file locations (./shoplake.toml, ./.shoplake.toml)
// 6. Built-in defaults (lowest priority)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, ENV_PREFIX};

/// Main runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Source tables known to `ingest`
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceTableConfig>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            source: SourceConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
            sources: default_sources(),
        }
    }
}

/// Lake storage backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    #[serde(default = "default_parquet_row_group_size")]
    pub parquet_row_group_size: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Config>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            parquet_row_group_size: default_parquet_row_group_size(),
            fs: Some(FsConfig::default()),
            s3: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Fs,
    S3,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Fs => write!(f, "fs"),
            StorageBackend::S3 => write!(f, "s3"),
        }
    }
}

fn default_parquet_row_group_size() -> usize {
    32 * 1024
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fs" | "filesystem" => Ok(StorageBackend::Fs),
            "s3" | "aws" => Ok(StorageBackend::S3),
            _ => anyhow::bail!("Unsupported storage backend: {}. Supported: fs, s3", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsConfig {
    /// Lake root; `raw/`, `staging/` and `curated/` live under it
    pub path: String,
    /// Stage writes here and rename into place
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atomic_write_dir: Option<String>,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            path: "./data-lake".to_string(),
            atomic_write_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Key prefix the lake lives under inside the bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// Where source tables are read from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: "./source_data".to_string(),
        }
    }
}

/// One source table and the lake table it feeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTableConfig {
    /// Lake table name (orders, customers, ...)
    pub table: String,
    /// File path relative to the source root
    pub file: String,
    /// Originating system recorded in every ingested row
    pub data_source: String,
}

impl SourceTableConfig {
    fn new(table: &str, file: &str, data_source: &str) -> Self {
        Self {
            table: table.to_string(),
            file: file.to_string(),
            data_source: data_source.to_string(),
        }
    }

    /// File name without its directory, as recorded in `source_file`.
    pub fn file_name(&self) -> &str {
        Path::new(&self.file)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.file)
    }
}

fn default_sources() -> Vec<SourceTableConfig> {
    vec![
        SourceTableConfig::new("orders", "ecommerce/olist_orders_dataset.csv", "ecommerce"),
        SourceTableConfig::new("customers", "ecommerce/olist_customers_dataset.csv", "ecommerce"),
        SourceTableConfig::new("products", "ecommerce/olist_products_dataset.csv", "ecommerce"),
        SourceTableConfig::new("sellers", "ecommerce/olist_sellers_dataset.csv", "ecommerce"),
        SourceTableConfig::new("marketing", "marketing/marketing_campaign_dataset.csv", "marketing"),
        SourceTableConfig::new("geolocation", "ecommerce/olist_geolocation_dataset.csv", "ecommerce"),
        SourceTableConfig::new("items", "ecommerce/olist_order_items_dataset.csv", "ecommerce"),
        SourceTableConfig::new("payments", "ecommerce/olist_order_payments_dataset.csv", "ecommerce"),
        SourceTableConfig::new("reviews", "ecommerce/olist_order_reviews_dataset.csv", "ecommerce"),
        SourceTableConfig::new(
            "categories",
            "ecommerce/product_category_name_translation.csv",
            "ecommerce",
        ),
    ]
}

/// Transformation behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub dedup_policy: DedupMode,
    /// Write a CSV copy next to every mart
    #[serde(default = "default_mirror_csv")]
    pub mirror_csv: bool,
}

fn default_mirror_csv() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dedup_policy: DedupMode::default(),
            mirror_csv: true,
        }
    }
}

/// Which duplicate survives normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupMode {
    #[default]
    LatestIngestion,
    FirstSeen,
}

impl std::str::FromStr for DedupMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "latest-ingestion" | "latest" => Ok(DedupMode::LatestIngestion),
            "first-seen" | "first" => Ok(DedupMode::FirstSeen),
            _ => anyhow::bail!(
                "Unsupported dedup policy: {}. Supported: latest-ingestion, first-seen",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration starting from an explicit file (CLI `--config`)
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Defaults, file and environment layered together but not yet validated.
    ///
    /// For callers that apply further overrides (CLI flags) before calling
    /// [`RuntimeConfig::validate`].
    pub fn layered(path: Option<&Path>) -> Result<Self> {
        sources::layered_config(path)
    }

    /// Build a configuration from optional inline TOML plus overrides supplied
    /// by an `EnvSource`.
    pub fn load_with_env<E: EnvSource>(inline_config: Option<&str>, env: &E) -> Result<Self> {
        sources::load_with_env(inline_config, env)
    }

    /// Merge another config into this one (used for TOML layering).
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.storage = other.storage;
        self.source = other.source;
        self.pipeline = other.pipeline;
        self.logging = other.logging;
        self.sources = other.sources;
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Source entry for a lake table
    pub fn source_for(&self, table: &str) -> Option<&SourceTableConfig> {
        self.sources.iter().find(|s| s.table == table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_from_str() {
        assert_eq!("fs".parse::<StorageBackend>().unwrap(), StorageBackend::Fs);
        assert_eq!("s3".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert_eq!(
            "filesystem".parse::<StorageBackend>().unwrap(),
            StorageBackend::Fs
        );
        assert!("r2".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_default_configs() {
        let config = RuntimeConfig::default();
        assert_eq!(config.storage.backend, StorageBackend::Fs);
        assert_eq!(config.storage.fs.as_ref().unwrap().path, "./data-lake");
        assert_eq!(config.pipeline.dedup_policy, DedupMode::LatestIngestion);
        assert!(config.pipeline.mirror_csv);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_eq!(config.sources.len(), 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_source_file_name() {
        let config = RuntimeConfig::default();
        let orders = config.source_for("orders").unwrap();
        assert_eq!(orders.file_name(), "olist_orders_dataset.csv");
        assert!(config.source_for("nope").is_none());
    }

    #[test]
    fn test_toml_sections_default_independently() {
        let config: RuntimeConfig = toml::from_str(
            r#"
            [pipeline]
            dedup_policy = "first-seen"
            "#,
        )
        .unwrap();
        assert_eq!(config.pipeline.dedup_policy, DedupMode::FirstSeen);
        assert!(config.pipeline.mirror_csv);
        assert_eq!(config.sources.len(), 10);
        assert_eq!(config.storage, StorageConfig::default());
    }
}
