// Configuration source loading.
//
// Priority order:
// 1. Environment variables (SHOPLAKE_* prefix)
// 2. Explicit config file (--config)
// 3. Config file path from SHOPLAKE_CONFIG
// 4. Inline config content from SHOPLAKE_CONFIG_CONTENT
// 5. Default config files (./shoplake.toml, ./.shoplake.toml)
// 6. Built-in defaults

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::*;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

/// Load configuration using process environment and default file locations.
pub fn load_config() -> Result<RuntimeConfig> {
    let config = layered_config(None)?;
    config.validate()?;
    Ok(config)
}

/// Defaults, then a config file, then environment overrides, without
/// validating.
///
/// `path` is the explicit `--config` file; without it the usual locations are
/// searched. Callers that still apply their own overrides validate afterwards.
pub fn layered_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    let mut config = RuntimeConfig::default();

    let file_config = match path {
        Some(path) => Some(parse_file(path)?),
        None => load_from_file()?,
    };
    if let Some(file_config) = file_config {
        config.merge(file_config);
    }

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    Ok(config)
}

fn parse_file(path: &Path) -> Result<RuntimeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn load_from_file() -> Result<Option<RuntimeConfig>> {
    if let Ok(path) = env::var(format!("{}CONFIG", ENV_PREFIX)) {
        return parse_file(Path::new(&path)).map(Some);
    }

    if let Ok(content) = env::var(format!("{}CONFIG_CONTENT", ENV_PREFIX)) {
        let config: RuntimeConfig = toml::from_str(&content)
            .context("Failed to parse inline config from SHOPLAKE_CONFIG_CONTENT")?;
        return Ok(Some(config));
    }

    for path in &["./shoplake.toml", "./.shoplake.toml"] {
        let path = Path::new(path);
        if path.exists() {
            return parse_file(path).map(Some);
        }
    }

    Ok(None)
}

/// Load configuration from a specific file path (for CLI --config flag).
/// Returns error if file doesn't exist or can't be parsed.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    let config = layered_config(Some(path.as_ref()))?;
    config.validate()?;
    Ok(config)
}

/// Defaults, then optional inline TOML, then overrides from `env`.
pub fn load_with_env<E: EnvSource>(inline_config: Option<&str>, env: &E) -> Result<RuntimeConfig> {
    let config = layered_with_env(inline_config, env)?;
    config.validate()?;
    Ok(config)
}

/// [`load_with_env`] without the final validation.
pub fn layered_with_env<E: EnvSource>(
    inline_config: Option<&str>,
    env: &E,
) -> Result<RuntimeConfig> {
    let mut config = RuntimeConfig::default();

    if let Some(inline) = inline_config {
        let file_config: RuntimeConfig =
            toml::from_str(inline).context("Failed to parse inline config content")?;
        config.merge(file_config);
    }

    env_overrides::apply_env_overrides(&mut config, env)?;
    Ok(config)
}

struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}
