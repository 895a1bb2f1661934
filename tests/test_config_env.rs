//! Environment variable overrides for config loading
//!
//! Kept in its own test binary: the process environment is global, and
//! other config tests must not observe these variables.

use anyhow::Result;
use std::io::Write;
use tempfile::NamedTempFile;
use tickstats::config::{
    ENV_HOST, ENV_INGEST_CAPACITY, ENV_OUTPUT_CAPACITY, ENV_PORT, ENV_TICK_MS, has_env_overrides,
    load_config,
};

fn set(key: &str, value: &str) {
    // SAFETY: this binary has a single test, so no other thread reads the environment
    unsafe { std::env::set_var(key, value) }
}

fn unset(key: &str) {
    // SAFETY: see `set`
    unsafe { std::env::remove_var(key) }
}

#[test]
fn test_env_overrides_file_values() -> Result<()> {
    let mut temp_file = NamedTempFile::new()?;
    temp_file.write_all(b"[server]\nport = 8100\n\n[pipeline]\ntick_ms = 3\n")?;
    temp_file.flush()?;
    let path = temp_file.path().to_str().unwrap().to_string();

    assert!(!has_env_overrides());
    let config = load_config(&path)?;
    assert_eq!(config.server.port.get(), 8100);
    assert_eq!(config.pipeline.tick_ms.get(), 3);

    set(ENV_HOST, "0.0.0.0");
    set(ENV_PORT, "9200");
    set(ENV_TICK_MS, "4");
    set(ENV_INGEST_CAPACITY, "2048");
    set(ENV_OUTPUT_CAPACITY, "256");
    assert!(has_env_overrides());

    let config = load_config(&path)?;
    assert_eq!(config.server.host.as_str(), "0.0.0.0");
    assert_eq!(config.server.port.get(), 9200);
    assert_eq!(config.pipeline.tick_ms.get(), 4);
    assert_eq!(config.pipeline.ingest_capacity.get(), 2048);
    assert_eq!(config.pipeline.output_capacity.get(), 256);

    set(ENV_PORT, "0");
    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().contains(ENV_PORT));

    set(ENV_PORT, "not-a-port");
    assert!(load_config(&path).is_err());

    for key in [
        ENV_HOST,
        ENV_PORT,
        ENV_TICK_MS,
        ENV_INGEST_CAPACITY,
        ENV_OUTPUT_CAPACITY,
    ] {
        unset(key);
    }
    assert!(!has_env_overrides());
    Ok(())
}
