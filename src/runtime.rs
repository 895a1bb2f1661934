//! Tokio runtime configuration and common utilities for the binary
//!
//! This module provides:
//! - Testable runtime configuration and builder logic
//! - Config loading with startup logging
//! - Shutdown signal handling

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigSource, load_config_with_fallback};
use crate::metrics::PipelineMetrics;
use crate::types::ThreadCount;

/// How often the debug metrics logger reports
const METRICS_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of worker threads
    worker_threads: usize,
}

impl RuntimeConfig {
    /// Create runtime config from optional thread count
    ///
    /// If `threads` is None, defaults to 1 thread.
    /// Single-threaded runtime is used if threads == 1.
    #[must_use]
    pub fn from_args(threads: Option<ThreadCount>) -> Self {
        let worker_threads = threads.map_or(1, |t| t.get());
        Self { worker_threads }
    }

    /// Get number of worker threads
    #[must_use]
    pub const fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// Check if single-threaded
    #[must_use]
    pub const fn is_single_threaded(&self) -> bool {
        self.worker_threads == 1
    }

    /// Build the tokio runtime
    ///
    /// Creates either a current-thread or multi-threaded runtime based on
    /// the configured worker thread count.
    ///
    /// # Errors
    /// Returns error if runtime creation fails
    pub fn build_runtime(self) -> Result<tokio::runtime::Runtime> {
        let rt = if self.is_single_threaded() {
            info!("Starting tickstats with single-threaded runtime");
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?
        } else {
            let num_cpus = std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(1);
            info!(
                "Starting tickstats with {} worker threads (detected {} CPUs)",
                self.worker_threads, num_cpus
            );
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(self.worker_threads)
                .enable_all()
                .build()?
        };

        Ok(rt)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_args(None)
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM on Unix)
///
/// A handler that cannot be installed is logged and never fires; the other
/// one still works.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Cancel `token` when a shutdown signal arrives
pub fn spawn_shutdown_handler(token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            () = shutdown_signal() => {
                info!("Shutdown signal received");
                token.cancel();
            }
            () = token.cancelled() => {}
        }
    });
}

/// Periodically log a metrics snapshot at debug level
///
/// Only spawns if debug logging is enabled. Stops with `cancel`.
pub fn spawn_metrics_logger(metrics: Arc<PipelineMetrics>, cancel: CancellationToken) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(METRICS_LOG_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => debug!("Pipeline metrics: {}", metrics.snapshot()),
            }
        }
    });
}

/// Load configuration and log where it came from
///
/// # Errors
/// Returns error if configuration loading fails
pub fn load_and_log_config(config_path: &str) -> Result<(Config, ConfigSource)> {
    let (config, source) = load_config_with_fallback(config_path)?;

    info!("Loaded configuration from {}", source.description());
    info!(
        "Pipeline: ingest_capacity={}, output_capacity={}, tick={}ms, start_on_subscribe={}",
        config.pipeline.ingest_capacity,
        config.pipeline.output_capacity,
        config.pipeline.tick_ms,
        config.pipeline.start_on_subscribe
    );

    Ok((config, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_config_default_single_threaded() {
        let config = RuntimeConfig::default();
        assert_eq!(config.worker_threads(), 1);
        assert!(config.is_single_threaded());
    }

    #[test]
    fn test_runtime_config_from_threads() {
        let config = RuntimeConfig::from_args(Some(ThreadCount::new(4).unwrap()));
        assert_eq!(config.worker_threads(), 4);
        assert!(!config.is_single_threaded());
    }

    #[test]
    fn test_build_single_threaded_runtime() {
        let rt = RuntimeConfig::default().build_runtime().unwrap();
        assert_eq!(rt.block_on(async { 1 + 1 }), 2);
    }

    #[test]
    fn test_build_multi_threaded_runtime() {
        let rt = RuntimeConfig::from_args(Some(ThreadCount::new(2).unwrap()))
            .build_runtime()
            .unwrap();
        assert_eq!(rt.block_on(async { 2 + 2 }), 4);
    }

    #[tokio::test]
    async fn test_shutdown_handler_exits_when_token_cancelled() {
        let token = CancellationToken::new();
        spawn_shutdown_handler(token.clone());
        token.cancel();
        tokio::task::yield_now().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_metrics_logger_noop_without_debug() {
        // No subscriber installed, so debug is disabled and nothing spawns
        spawn_metrics_logger(Arc::new(PipelineMetrics::new()), CancellationToken::new());
    }
}
