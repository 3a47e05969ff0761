use crate::{DedupMode, FsConfig, LogFormat, RuntimeConfig, S3Config, StorageBackend};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "SHOPLAKE_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    /// Get a variable by its name without the `SHOPLAKE_` prefix
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the SHOPLAKE_ prefix
    /// Used for AWS standard variables (AWS_REGION, AWS_ENDPOINT_URL)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Storage backend
    if let Some(backend) = get_env_string(env, "STORAGE_BACKEND")? {
        config.storage.backend = backend
            .parse::<StorageBackend>()
            .context("Invalid SHOPLAKE_STORAGE_BACKEND value")?;
    }
    if let Some(row_group_size) = get_env_usize(env, "PARQUET_ROW_GROUP_SIZE")? {
        config.storage.parquet_row_group_size = row_group_size;
    }

    // Filesystem storage
    if let Some(path) = get_env_string(env, "STORAGE_PATH")? {
        ensure_fs(config).path = path;
    }
    if let Some(dir) = get_env_string(env, "ATOMIC_WRITE_DIR")? {
        ensure_fs(config).atomic_write_dir = Some(dir);
    }

    // S3 storage
    if let Some(bucket) = get_env_string(env, "S3_BUCKET")? {
        ensure_s3(config).bucket = bucket;
    }
    if let Some(region) = get_env_string(env, "S3_REGION")? {
        ensure_s3(config).region = region;
    } else if let Some(region) = get_raw_env_string(env, "AWS_REGION")? {
        if let Some(ref mut s3) = config.storage.s3 {
            if s3.region.is_empty() {
                s3.region = region;
            }
        }
    }
    if let Some(endpoint) = get_env_string(env, "S3_ENDPOINT")? {
        ensure_s3(config).endpoint = Some(endpoint);
    } else if let Some(endpoint) = get_raw_env_string(env, "AWS_ENDPOINT_URL")? {
        if let Some(ref mut s3) = config.storage.s3 {
            s3.endpoint.get_or_insert(endpoint);
        }
    }
    if let Some(prefix) = get_env_string(env, "S3_PREFIX")? {
        // Normalize prefix: ensure it ends with "/" if non-empty
        let normalized = if prefix.is_empty() {
            None
        } else if prefix.ends_with('/') {
            Some(prefix)
        } else {
            Some(format!("{}/", prefix))
        };
        ensure_s3(config).prefix = normalized;
    }

    // Source tables
    if let Some(path) = get_env_string(env, "SOURCE_PATH")? {
        config.source.path = path;
    }

    // Pipeline behaviour
    if let Some(policy) = get_env_string(env, "DEDUP_POLICY")? {
        config.pipeline.dedup_policy = policy
            .parse::<DedupMode>()
            .context("Invalid SHOPLAKE_DEDUP_POLICY value")?;
    }
    if let Some(mirror) = get_env_bool(env, "MIRROR_CSV")? {
        config.pipeline.mirror_csv = mirror;
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL")? {
        config.logging.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT")? {
        config.logging.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    Ok(())
}

fn ensure_fs(config: &mut RuntimeConfig) -> &mut FsConfig {
    config.storage.fs.get_or_insert_with(FsConfig::default)
}

fn ensure_s3(config: &mut RuntimeConfig) -> &mut S3Config {
    config.storage.s3.get_or_insert_with(|| S3Config {
        bucket: String::new(),
        region: String::new(),
        endpoint: None,
        prefix: None,
    })
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get(key))
}

fn get_raw_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get_raw(key))
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_bool<E: EnvSource>(env: &E, key: &str) -> Result<Option<bool>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val.parse::<bool>().map_err(|e| {
                anyhow!(
                    "Failed to parse {}{} (expected bool): {}",
                    ENV_PREFIX,
                    key,
                    e
                )
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
