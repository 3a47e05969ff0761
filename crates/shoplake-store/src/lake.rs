//! Lake reads and writes
//!
//! Every object is fully encoded in memory and handed to OpenDAL in a single
//! write call. Raw partitions are write-once; snapshots and marts are replaced.

use std::collections::{BTreeMap, HashMap, HashSet};

use arrow::array::RecordBatch;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use opendal::{ErrorKind, Operator};
use shoplake_core::{
    decode_parquet, encode_csv, encode_parquet, DedupPolicy, MartKind, ParquetOptions, Provenance,
    TableSpec,
};

use crate::error::{Result, StoreError};
use crate::layout;
use crate::manifest::{sort_entries, PartitionEntry, PartitionManifest};

pub const TABLE_KEY: &str = "shoplake.table";
pub const DEDUP_POLICY_KEY: &str = "shoplake.dedup_policy";
pub const INPUTS_KEY: &str = "shoplake.inputs";
pub const MART_KEY: &str = "shoplake.mart";

/// A staging snapshot and the lineage recorded in its footer.
#[derive(Debug, Clone)]
pub struct StagedSnapshot {
    pub batch: RecordBatch,
    /// Raw partition paths that fed the snapshot, in concatenation order
    pub inputs: Vec<String>,
    pub dedup_policy: Option<String>,
}

/// Outcome of writing one mart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MartWrite {
    pub path: String,
    pub rows: usize,
    pub csv_path: Option<String>,
}

/// The partitioned Parquet lake behind one OpenDAL operator.
#[derive(Debug, Clone)]
pub struct Lake {
    op: Operator,
    parquet: ParquetOptions,
}

impl Lake {
    pub fn new(op: Operator, parquet: ParquetOptions) -> Self {
        Self { op, parquet }
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    /// Write a new raw partition and record it in the table's manifest.
    ///
    /// `batch` must already carry its provenance columns. Fails without
    /// touching storage when a partition already exists at the target path.
    pub async fn write_raw_partition(
        &self,
        spec: &TableSpec,
        batch: &RecordBatch,
        provenance: &Provenance<'_>,
    ) -> Result<PartitionEntry> {
        let path = layout::raw_partition_path(spec, provenance.ingested_at);
        if self.exists(&path).await? {
            return Err(StoreError::write_failure(format!(
                "Refusing to overwrite existing partition '{}'",
                path
            )));
        }

        // Seed from a scan so partitions written before the manifest existed stay visible
        let mut manifest = match self.manifest(spec).await? {
            Some(manifest) => manifest,
            None => {
                let mut manifest = PartitionManifest::new(spec.name);
                for entry in self.scan_partitions(spec).await? {
                    manifest.push(entry);
                }
                manifest
            }
        };

        let mut metadata = BTreeMap::new();
        metadata.insert(TABLE_KEY.to_string(), spec.name.to_string());
        let bytes = encode_parquet(batch, &self.parquet, &metadata)?;
        let content_hash = blake3::hash(&bytes).to_hex().to_string();
        let bytes_written = bytes.len();
        self.write_bytes(&path, bytes).await?;

        let entry = PartitionEntry {
            ingestion_date: provenance.ingested_at.date_naive(),
            ingestion_timestamp: provenance.ingested_at,
            path: path.clone(),
            row_count: Some(batch.num_rows()),
            source_file: provenance.source_file.to_string(),
            data_source: provenance.data_source.to_string(),
            content_hash: Some(content_hash),
        };
        manifest.push(entry.clone());
        self.write_bytes(&layout::manifest_path(spec), manifest.to_vec()?)
            .await?;

        tracing::info!(
            "✓ Wrote {} rows to '{}' ({} bytes)",
            batch.num_rows(),
            path,
            bytes_written
        );
        Ok(entry)
    }

    /// The table's manifest, if one has been written.
    pub async fn manifest(&self, spec: &TableSpec) -> Result<Option<PartitionManifest>> {
        match self.read_bytes(&layout::manifest_path(spec)).await? {
            Some(bytes) => PartitionManifest::from_slice(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Raw partitions of a table in concatenation order.
    ///
    /// The table directory is always listed; manifest entries only enrich the
    /// files found there with their row count, hash and source details.
    pub async fn partitions(&self, spec: &TableSpec) -> Result<Vec<PartitionEntry>> {
        let scanned = self.scan_partitions(spec).await?;
        let Some(manifest) = self.manifest(spec).await? else {
            tracing::debug!(table = spec.name, "No manifest, using scanned partitions");
            return Ok(scanned);
        };

        let recorded: HashMap<&str, &PartitionEntry> = manifest
            .partitions
            .iter()
            .map(|entry| (entry.path.as_str(), entry))
            .collect();
        let mut entries = Vec::with_capacity(scanned.len());
        for found in scanned {
            match recorded.get(found.path.as_str()) {
                Some(entry) => entries.push((*entry).clone()),
                None => {
                    tracing::warn!(
                        table = spec.name,
                        path = %found.path,
                        "Raw partition is not listed in the manifest"
                    );
                    entries.push(found);
                }
            }
        }

        let present: HashSet<&str> = entries.iter().map(|entry| entry.path.as_str()).collect();
        for entry in &manifest.partitions {
            if !present.contains(entry.path.as_str()) {
                tracing::warn!(
                    table = spec.name,
                    path = %entry.path,
                    "Manifest lists a raw partition that no longer exists"
                );
            }
        }

        sort_entries(&mut entries);
        Ok(entries)
    }

    async fn scan_partitions(&self, spec: &TableSpec) -> Result<Vec<PartitionEntry>> {
        let dir = layout::raw_table_dir(spec);
        let listed = match self.op.list_with(&dir).recursive(true).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(StoreError::read_failure(format!(
                    "Failed to list '{}': {}",
                    dir, e
                )))
            }
        };

        let mut entries: Vec<PartitionEntry> = listed
            .iter()
            .filter(|entry| entry.metadata().mode().is_file() && entry.path().ends_with(".parquet"))
            .map(|entry| scanned_entry(entry.path()))
            .collect();
        sort_entries(&mut entries);
        Ok(entries)
    }

    /// Every raw partition of a table, decoded, in concatenation order.
    pub async fn read_raw_partitions(
        &self,
        spec: &TableSpec,
    ) -> Result<Vec<(PartitionEntry, RecordBatch)>> {
        let entries = self.partitions(spec).await?;
        if entries.is_empty() {
            return Err(StoreError::no_raw_data(
                spec.name,
                layout::raw_table_dir(spec),
            ));
        }

        let mut partitions = Vec::with_capacity(entries.len());
        for entry in entries {
            let bytes = self.read_bytes(&entry.path).await?.ok_or_else(|| {
                StoreError::read_failure(format!(
                    "Partition '{}' disappeared while reading",
                    entry.path
                ))
            })?;
            let batch = decode_parquet(bytes)?.batch;
            tracing::debug!(path = %entry.path, rows = batch.num_rows(), "Read raw partition");
            partitions.push((entry, batch));
        }
        Ok(partitions)
    }

    /// Replace a table's staging snapshot, recording its lineage in the footer.
    pub async fn write_snapshot(
        &self,
        spec: &TableSpec,
        batch: &RecordBatch,
        inputs: &[PartitionEntry],
        policy: DedupPolicy,
    ) -> Result<String> {
        let input_paths: Vec<&str> = inputs.iter().map(|entry| entry.path.as_str()).collect();
        let inputs_json = serde_json::to_string(&input_paths)
            .map_err(|e| StoreError::write_failure(format!("Failed to encode lineage: {}", e)))?;

        let mut metadata = BTreeMap::new();
        metadata.insert(TABLE_KEY.to_string(), spec.name.to_string());
        metadata.insert(DEDUP_POLICY_KEY.to_string(), policy.as_str().to_string());
        metadata.insert(INPUTS_KEY.to_string(), inputs_json);

        let path = layout::snapshot_path(spec);
        let bytes = encode_parquet(batch, &self.parquet, &metadata)?;
        let bytes_written = bytes.len();
        self.write_bytes(&path, bytes).await?;

        tracing::info!(
            "✓ Wrote {} rows to '{}' ({} bytes)",
            batch.num_rows(),
            path,
            bytes_written
        );
        Ok(path)
    }

    /// A table's staging snapshot, or `None` when it has never been built.
    pub async fn read_snapshot(&self, spec: &TableSpec) -> Result<Option<StagedSnapshot>> {
        let Some(bytes) = self.read_bytes(&layout::snapshot_path(spec)).await? else {
            return Ok(None);
        };
        let decoded = decode_parquet(bytes)?;
        let inputs = match decoded.metadata.get(INPUTS_KEY) {
            Some(json) => serde_json::from_str(json).map_err(|e| {
                StoreError::read_failure(format!(
                    "Invalid lineage in snapshot for '{}': {}",
                    spec.name, e
                ))
            })?,
            None => Vec::new(),
        };
        Ok(Some(StagedSnapshot {
            batch: decoded.batch,
            inputs,
            dedup_policy: decoded.metadata.get(DEDUP_POLICY_KEY).cloned(),
        }))
    }

    /// Replace a mart, optionally mirroring it as CSV.
    pub async fn write_mart(
        &self,
        mart: MartKind,
        batch: &RecordBatch,
        mirror_csv: bool,
    ) -> Result<MartWrite> {
        let mut metadata = BTreeMap::new();
        metadata.insert(MART_KEY.to_string(), mart.name().to_string());

        let path = layout::mart_path(mart);
        let bytes = encode_parquet(batch, &self.parquet, &metadata)?;
        self.write_bytes(&path, bytes).await?;

        let csv_path = if mirror_csv {
            let csv_path = layout::mart_csv_path(mart);
            self.write_bytes(&csv_path, encode_csv(batch)?).await?;
            Some(csv_path)
        } else {
            None
        };

        tracing::info!("✓ Wrote {} rows to '{}'", batch.num_rows(), path);
        Ok(MartWrite {
            path,
            rows: batch.num_rows(),
            csv_path,
        })
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        self.op.exists(path).await.map_err(|e| {
            StoreError::read_failure(format!("Failed to check '{}': {}", path, e))
        })
    }

    async fn read_bytes(&self, path: &str) -> Result<Option<Bytes>> {
        match self.op.read(path).await {
            Ok(buffer) => Ok(Some(buffer.to_bytes())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::read_failure(format!(
                "Failed to read '{}': {}",
                path, e
            ))),
        }
    }

    async fn write_bytes(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        tracing::debug!("Writing {} bytes to path: {}", bytes.len(), path);
        self.op.write(path, bytes).await.map_err(|e| {
            StoreError::write_failure(format!("Failed to write '{}': {}", path, e))
        })?;
        Ok(())
    }
}

/// Manifest entry for a partition found by listing.
fn scanned_entry(path: &str) -> PartitionEntry {
    let timestamp = layout::ingestion_timestamp_of(path);
    let date = layout::ingestion_date_of(path).or(timestamp.map(|t| t.date_naive()));
    let ingestion_timestamp = timestamp
        .or_else(|| date.and_then(|d| d.and_hms_opt(0, 0, 0)).map(|naive| naive.and_utc()))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    PartitionEntry {
        ingestion_date: date.unwrap_or_else(|| ingestion_timestamp.date_naive()),
        ingestion_timestamp,
        path: path.to_string(),
        row_count: None,
        source_file: String::new(),
        data_source: String::new(),
        content_hash: None,
    }
}
