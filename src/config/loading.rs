//! Configuration loading from files and environment variables
//!
//! Environment variables take precedence over the file so a container can
//! retune the pipeline without editing it.

use anyhow::{Context, Result};
use std::path::Path;
use std::str::FromStr;

use super::types::Config;

/// Listener host override
pub const ENV_HOST: &str = "TICKSTATS_HOST";
/// Listener port override
pub const ENV_PORT: &str = "TICKSTATS_PORT";
/// Pacing tick override, in milliseconds
pub const ENV_TICK_MS: &str = "TICKSTATS_TICK_MS";
/// Ingestion lane capacity override
pub const ENV_INGEST_CAPACITY: &str = "TICKSTATS_INGEST_CAPACITY";
/// Output lane capacity override
pub const ENV_OUTPUT_CAPACITY: &str = "TICKSTATS_OUTPUT_CAPACITY";

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Loaded from this file
    File(String),
    /// No file found; built-in defaults plus environment
    Defaults,
}

impl ConfigSource {
    /// Human-readable description for startup logs
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::File(path) => format!("config file '{}'", path),
            Self::Defaults => "built-in defaults".to_string(),
        }
    }
}

fn env_value<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid value '{}' for {}: {}", raw, key, e)),
        Err(_) => Ok(None),
    }
}

/// Apply `TICKSTATS_*` environment overrides to `config`
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(host) = env_value(ENV_HOST)? {
        tracing::info!("Using listener host from {}", ENV_HOST);
        config.server.host = host;
    }
    if let Some(port) = env_value(ENV_PORT)? {
        tracing::info!("Using listener port from {}", ENV_PORT);
        config.server.port = port;
    }
    if let Some(tick) = env_value(ENV_TICK_MS)? {
        tracing::info!("Using pacing tick from {}", ENV_TICK_MS);
        config.pipeline.tick_ms = tick;
    }
    if let Some(capacity) = env_value(ENV_INGEST_CAPACITY)? {
        tracing::info!("Using ingest capacity from {}", ENV_INGEST_CAPACITY);
        config.pipeline.ingest_capacity = capacity;
    }
    if let Some(capacity) = env_value(ENV_OUTPUT_CAPACITY)? {
        tracing::info!("Using output capacity from {}", ENV_OUTPUT_CAPACITY);
        config.pipeline.output_capacity = capacity;
    }
    Ok(())
}

/// Check whether any `TICKSTATS_*` override is present
#[must_use]
pub fn has_env_overrides() -> bool {
    [
        ENV_HOST,
        ENV_PORT,
        ENV_TICK_MS,
        ENV_INGEST_CAPACITY,
        ENV_OUTPUT_CAPACITY,
    ]
    .iter()
    .any(|key| std::env::var_os(key).is_some())
}

/// Load configuration from a TOML file, with environment variable overrides
///
/// The result is validated before it is returned.
pub fn load_config(config_path: &str) -> Result<Config> {
    let config_content = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", config_path, e))?;

    let mut config: Config = toml::from_str(&config_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", config_path, e))?;

    apply_env_overrides(&mut config)?;
    config.validate()?;

    Ok(config)
}

/// Load configuration from the environment on top of built-in defaults
pub fn load_config_from_env() -> Result<Config> {
    let mut config = create_default_config();
    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load the config file if it exists, otherwise fall back to defaults
///
/// A file that exists but fails to parse is still an error.
pub fn load_config_with_fallback(config_path: &str) -> Result<(Config, ConfigSource)> {
    if Path::new(config_path).exists() {
        let config = load_config(config_path)?;
        return Ok((config, ConfigSource::File(config_path.to_string())));
    }

    let config = load_config_from_env()
        .with_context(|| format!("Config file '{}' not found and defaults are invalid", config_path))?;
    Ok((config, ConfigSource::Defaults))
}

/// Create a default configuration
#[must_use]
pub fn create_default_config() -> Config {
    Config::default()
}
