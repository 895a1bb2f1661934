//! Configuration module
//!
//! This module handles all configuration types and loading
//! for the pipeline.

mod defaults;
mod loading;
mod types;
mod validation;

// Re-export public types
pub use loading::{
    ConfigSource, ENV_HOST, ENV_INGEST_CAPACITY, ENV_OUTPUT_CAPACITY, ENV_PORT, ENV_TICK_MS,
    apply_env_overrides, create_default_config, has_env_overrides, load_config,
    load_config_from_env, load_config_with_fallback,
};
pub use types::{Config, FeedConfig, PipelineConfig, ServerConfig};
pub use validation::MAX_TICK;

// Re-export default functions for use in tests and other modules
pub use defaults::{
    host, ingest_capacity, output_capacity, port, start_on_subscribe, threads, tick,
};
