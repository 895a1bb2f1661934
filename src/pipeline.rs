//! Pipeline wiring: pacer → stats engine → publisher
//!
//! [`Pipeline::run`] builds the two lanes, spawns the engine and publisher
//! as tasks and drives the pacer on the calling task. All three share one
//! [`CancellationToken`]; cancelling it (from a signal handler, or after the
//! feed drains with `exit_after_feed`) stops every stage at its next
//! suspension point.

use futures::Stream;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::constants::pipeline::{DRAIN_POLL, SHUTDOWN_GRACE};
use crate::error::{FeedError, PipelineError};
use crate::fabric::{Lane, ReadySignal};
use crate::feed::Event;
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::pacer::{Pacer, PacerReport};
use crate::publisher::{Publisher, SubscriberSource};
use crate::stats::{RunningStats, StatsEngine};
use crate::types::{QueueCapacity, TickInterval};

/// Runtime knobs for one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub ingest_capacity: QueueCapacity,
    pub output_capacity: QueueCapacity,
    pub tick: TickInterval,
    pub start_on_subscribe: bool,
    /// Stop once everything released has been processed and published
    pub exit_after_feed: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            ingest_capacity: QueueCapacity::INGEST,
            output_capacity: QueueCapacity::OUTPUT,
            tick: TickInterval::DEFAULT,
            start_on_subscribe: true,
            exit_after_feed: false,
        }
    }
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            ingest_capacity: config.pipeline.ingest_capacity,
            output_capacity: config.pipeline.output_capacity,
            tick: config.pipeline.tick_ms,
            start_on_subscribe: config.pipeline.start_on_subscribe,
            exit_after_feed: false,
        }
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub pacer: PacerReport,
    /// Final running statistics over every delta the engine saw
    pub stats: RunningStats,
    pub metrics: MetricsSnapshot,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "released {} events ({} dropped) over {} ticks; {} deltas, mean {:.3}s",
            self.pacer.released,
            self.pacer.dropped,
            self.pacer.elapsed_ticks,
            self.stats.count(),
            self.stats.mean(),
        )?;
        if let Some(std_dev) = self.stats.std_dev() {
            write!(f, ", std_dev {:.3}s", std_dev)?;
        }
        let losses = self.metrics.overflow_losses();
        if losses > 0 {
            write!(f, "; {} lost to queue overflow", losses)?;
        }
        Ok(())
    }
}

/// Three-stage replay pipeline
#[derive(Debug)]
pub struct Pipeline {
    options: PipelineOptions,
    metrics: Arc<PipelineMetrics>,
    cancel: CancellationToken,
}

impl Pipeline {
    #[must_use]
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            options,
            metrics: Arc::new(PipelineMetrics::new()),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub const fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Shared counters, readable while the pipeline runs
    #[must_use]
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    /// Token that stops the pipeline when cancelled
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until the feed fails, the token is cancelled, or (with
    /// `exit_after_feed`) the feed has fully drained
    ///
    /// # Errors
    /// Returns [`PipelineError::Feed`] if the feed is unreadable or
    /// malformed, and [`PipelineError::Join`] if a stage task panics or
    /// does not stop within the shutdown grace period.
    pub async fn run<F, S>(self, feed: F, source: S) -> Result<RunReport, PipelineError>
    where
        F: Stream<Item = Result<Event, FeedError>>,
        S: SubscriberSource + 'static,
        S::Subscriber: 'static,
    {
        let Self {
            options,
            metrics,
            cancel,
        } = self;

        let ingest = Arc::new(Lane::new(options.ingest_capacity.get()));
        let output = Arc::new(Lane::new(options.output_capacity.get()));
        let attached = Arc::new(ReadySignal::new());

        let engine = tokio::spawn(StatsEngine::new().run(
            ingest.clone(),
            output.clone(),
            metrics.clone(),
            cancel.clone(),
        ));
        let publisher = tokio::spawn(
            Publisher::new(source, output, metrics.clone())
                .with_attach_signal(attached.clone())
                .run(cancel.clone()),
        );

        let mut pacer = Pacer::new(options.tick, metrics.clone());
        if options.start_on_subscribe {
            pacer = pacer.with_start_gate(attached);
        }
        let paced = pacer.run(feed, ingest.clone(), cancel.clone()).await;

        match &paced {
            Ok(report) if !report.cancelled => {
                info!(
                    released = report.released,
                    dropped = report.dropped,
                    "Feed exhausted"
                );
                if options.exit_after_feed {
                    wait_for_drain(&metrics, &ingest, &cancel).await;
                    info!("All released events processed, stopping");
                    cancel.cancel();
                } else {
                    info!("Serving subscribers until shutdown");
                    cancel.cancelled().await;
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("Feed failed: {}", e);
                cancel.cancel();
            }
        }
        cancel.cancel();

        let stats = join_stage("stats engine", engine).await;
        let published = join_stage("publisher", publisher).await;

        let pacer = paced?;
        let stats = stats?;
        published?;

        let report = RunReport {
            pacer,
            stats,
            metrics: metrics.snapshot(),
        };
        info!("Pipeline stopped: {}", report);
        Ok(report)
    }
}

/// Wait until nothing released is still in flight
///
/// The condition must hold on two consecutive polls so a sample being
/// handed between stages is not mistaken for a drained pipeline.
async fn wait_for_drain(
    metrics: &PipelineMetrics,
    ingest: &Lane<Event>,
    cancel: &CancellationToken,
) {
    let mut settled = false;
    loop {
        let snap = metrics.snapshot();
        let drained = ingest.is_empty()
            && snap.engine_caught_up()
            && (!snap.session_active() || snap.publisher_caught_up());

        if drained && settled {
            return;
        }
        settled = drained;

        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(DRAIN_POLL) => {}
        }
    }
}

/// Await a stage task, aborting it if it overruns the grace period
async fn join_stage<T>(stage: &'static str, mut handle: JoinHandle<T>) -> Result<T, PipelineError> {
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(PipelineError::Join {
            stage,
            reason: e.to_string(),
        }),
        Err(_) => {
            handle.abort();
            Err(PipelineError::Join {
                stage,
                reason: format!("did not stop within {:?}", SHUTDOWN_GRACE),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::from_timestamps;
    use crate::publisher::channel;

    fn options() -> PipelineOptions {
        PipelineOptions {
            exit_after_feed: true,
            ..PipelineOptions::default()
        }
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.pipeline.start_on_subscribe = false;
        config.pipeline.tick_ms = TickInterval::new(10).unwrap();

        let opts = PipelineOptions::from(&config);
        assert!(!opts.start_on_subscribe);
        assert_eq!(opts.tick.get(), 10);
        assert!(!opts.exit_after_feed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_after_feed_without_subscriber() {
        let (source, _connector) = channel(1);
        let pipeline = Pipeline::new(PipelineOptions {
            start_on_subscribe: false,
            ..options()
        });

        let report = pipeline
            .run(from_timestamps([0.0, 0.001, 0.003]), source)
            .await
            .unwrap();

        assert_eq!(report.pacer.released, 3);
        assert_eq!(report.stats.count(), 2);
        assert_eq!(report.metrics.samples_emitted, 2);
        assert_eq!(report.metrics.samples_sent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_error_surfaces() {
        let (source, _connector) = channel(1);
        let pipeline = Pipeline::new(PipelineOptions {
            start_on_subscribe: false,
            ..options()
        });

        let err = pipeline
            .run(from_timestamps([0.0, 0.002, 0.001]), source)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Feed(FeedError::NonMonotonic { record: 3, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_token_stops_gated_pipeline() {
        let (source, _connector) = channel(1);
        let pipeline = Pipeline::new(options());
        let token = pipeline.shutdown_token();

        let run = tokio::spawn(pipeline.run(from_timestamps([0.0, 0.001]), source));
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        token.cancel();

        let report = run.await.unwrap().unwrap();
        assert!(report.pacer.cancelled);
        assert_eq!(report.pacer.released, 0);
    }

    #[test]
    fn test_run_report_display() {
        let mut stats = RunningStats::new();
        stats.push(0.002);
        stats.push(0.004);
        let report = RunReport {
            pacer: PacerReport {
                released: 3,
                dropped: 0,
                elapsed_ticks: 6,
                cancelled: false,
            },
            stats,
            metrics: MetricsSnapshot::default(),
        };
        let text = report.to_string();
        assert!(text.contains("released 3 events"));
        assert!(text.contains("mean 0.003s"));
        assert!(text.contains("std_dev 0.001s"));
        assert!(!text.contains("overflow"));
    }

    #[test]
    fn test_run_report_display_overflow_losses() {
        let report = RunReport {
            pacer: PacerReport {
                released: 4,
                dropped: 1,
                elapsed_ticks: 9,
                cancelled: false,
            },
            stats: RunningStats::new(),
            metrics: MetricsSnapshot {
                events_dropped: 1,
                samples_dropped: 2,
                ..MetricsSnapshot::default()
            },
        };
        assert!(report.to_string().ends_with("; 3 lost to queue overflow"));
    }
}
