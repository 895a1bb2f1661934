//! Configuration type definitions

use crate::types::{HostName, Port, QueueCapacity, ThreadCount, TickInterval};
use serde::{Deserialize, Serialize};
use std::net::Ipv6Addr;
use std::path::PathBuf;

use super::defaults;

/// Main configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    /// Queue sizes and pacing
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Subscriber listener settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Event feed location
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Queue sizes and pacing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ingestion lane capacity (default: 512)
    pub ingest_capacity: QueueCapacity,
    /// Output lane capacity (default: 128)
    pub output_capacity: QueueCapacity,
    /// Pacing tick in milliseconds (default: 1)
    pub tick_ms: TickInterval,
    /// Hold the feed clock until the first subscriber handshake (default: true)
    pub start_on_subscribe: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ingest_capacity: defaults::ingest_capacity(),
            output_capacity: defaults::output_capacity(),
            tick_ms: defaults::tick(),
            start_on_subscribe: defaults::start_on_subscribe(),
        }
    }
}

/// Subscriber listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Host/IP to bind to (default: 127.0.0.1)
    pub host: HostName,
    /// Port to listen on (default: 8000)
    pub port: Port,
    /// Number of worker threads (default: 1)
    pub threads: ThreadCount,
}

impl ServerConfig {
    /// `host:port` string suitable for binding
    ///
    /// IPv6 literals are bracketed (`[::1]:8000`).
    #[must_use]
    pub fn listen_addr(&self) -> String {
        let host = self.host.as_str();
        if host.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            port: defaults::port(),
            threads: defaults::threads(),
        }
    }
}

/// Event feed location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct FeedConfig {
    /// Feed file; the command-line argument takes precedence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}
