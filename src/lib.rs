//! tickstats: replay a timestamped event feed in real time and stream
//! inter-arrival statistics to a subscriber
//!
//! Three cooperating stages joined by bounded lanes:
//!
//! ```text
//! feed ──► Pacer ──(ingest lane)──► StatsEngine ──(output lane)──► Publisher ──► subscriber
//! ```
//!
//! - [`pacer::Pacer`] releases each event once its timestamp has elapsed
//! - [`stats::StatsEngine`] folds inter-arrival deltas into running
//!   mean/std-dev with Welford's algorithm
//! - [`publisher::Publisher`] forwards one JSON frame per sample to a
//!   single subscriber
//!
//! Overflow on either lane drops the newest item and is counted in
//! [`metrics::PipelineMetrics`]; it never stalls the upstream stage.

pub mod args;
pub mod config;
pub mod constants;
pub mod error;
pub mod fabric;
pub mod feed;
pub mod logging;
pub mod metrics;
pub mod pacer;
pub mod pipeline;
pub mod publisher;
pub mod runtime;
pub mod stats;
pub mod types;
pub mod wire;

pub use config::{
    Config, ConfigSource, create_default_config, load_config, load_config_with_fallback,
};
pub use error::{FeedError, PipelineError, SubscriberError};
pub use fabric::{BoundedQueue, Lane, QueueFull, ReadySignal};
pub use feed::{Event, EventFeed};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use pacer::{Pacer, PacerReport};
pub use pipeline::{Pipeline, PipelineOptions, RunReport};
pub use publisher::{Publisher, Subscriber, SubscriberSource, WsSource};
pub use stats::{MetricSample, RunningStats, StatsEngine};
pub use wire::WireMessage;
