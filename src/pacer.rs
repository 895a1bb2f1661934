//! Event Source: replays the feed at the pace its timestamps imply
//!
//! The pacer keeps an elapsed-time counter that advances one tick per
//! interval firing. An event with timestamp `t` is released once the
//! counter reaches `t`, so it is never early and at most one tick late.
//! The counter is private to this stage.

use futures::{Stream, StreamExt};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::FeedError;
use crate::fabric::{Lane, ReadySignal};
use crate::feed::Event;
use crate::metrics::PipelineMetrics;
use crate::types::TickInterval;

/// Summary of one pacer run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacerReport {
    /// Events enqueued on the ingestion lane
    pub released: u64,
    /// Events lost to ingestion overflow
    pub dropped: u64,
    /// Ticks the clock advanced
    pub elapsed_ticks: u64,
    /// The run stopped on cancellation before the feed ended
    pub cancelled: bool,
}

/// Tick-driven elapsed-time counter
///
/// Ticks are anchored to the start instant, so a slow wakeup does not push
/// later ticks back.
#[derive(Debug)]
pub struct PacingClock {
    tick: Duration,
    ticks: u64,
    interval: Interval,
}

impl PacingClock {
    /// Start a clock at zero elapsed ticks
    #[must_use]
    pub fn start(tick: TickInterval) -> Self {
        let tick = tick.as_duration();
        let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
        Self {
            tick,
            ticks: 0,
            interval,
        }
    }

    /// Ticks elapsed since start
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Elapsed pipeline time
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.tick_nanos().saturating_mul(self.ticks))
    }

    /// First tick count whose elapsed time is at least `due`
    #[must_use]
    pub fn ticks_until(&self, due: Duration) -> u64 {
        let due = u64::try_from(due.as_nanos()).unwrap_or(u64::MAX);
        due.div_ceil(self.tick_nanos())
    }

    /// Sleep one tick and advance the counter
    ///
    /// Returns `false` if `cancel` fired first.
    pub async fn advance(&mut self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            _ = self.interval.tick() => {
                self.ticks += 1;
                true
            }
        }
    }

    fn tick_nanos(&self) -> u64 {
        u64::try_from(self.tick.as_nanos()).unwrap_or(u64::MAX).max(1)
    }
}

/// Paced event source
#[derive(Debug)]
pub struct Pacer {
    tick: TickInterval,
    metrics: Arc<PipelineMetrics>,
    start_gate: Option<Arc<ReadySignal>>,
}

impl Pacer {
    #[must_use]
    pub fn new(tick: TickInterval, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            tick,
            metrics,
            start_gate: None,
        }
    }

    /// Hold the clock at zero until `gate` is set
    #[must_use]
    pub fn with_start_gate(mut self, gate: Arc<ReadySignal>) -> Self {
        self.start_gate = Some(gate);
        self
    }

    /// Release every feed event into `ingest` at its timestamp
    ///
    /// Ends when the feed is exhausted or `cancel` fires. The lane is left
    /// open either way. A feed error aborts the run.
    pub async fn run<S>(
        self,
        feed: S,
        ingest: Arc<Lane<Event>>,
        cancel: CancellationToken,
    ) -> Result<PacerReport, FeedError>
    where
        S: Stream<Item = Result<Event, FeedError>>,
    {
        let mut feed = pin!(feed);
        let mut report = PacerReport::default();

        if let Some(gate) = &self.start_gate {
            info!("Event source waiting for the first subscriber before starting the clock");
            if !gate.wait_or_cancel(&cancel).await {
                report.cancelled = true;
                return Ok(report);
            }
        }

        let mut clock = PacingClock::start(self.tick);
        let mut previous: Option<f64> = None;
        let mut overflow_streak: u64 = 0;
        info!(tick_ms = self.tick.get(), "Event source started");

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                next = feed.next() => next,
            };
            let Some(event) = next.transpose()? else {
                break;
            };

            if let Some(previous) = previous.filter(|p| event.timestamp < *p) {
                return Err(FeedError::NonMonotonic {
                    record: event.sequence_number,
                    previous,
                    value: event.timestamp,
                });
            }
            previous = Some(event.timestamp);

            let due = Duration::try_from_secs_f64(event.timestamp).map_err(|_| {
                FeedError::Unpaceable {
                    record: event.sequence_number,
                    value: event.timestamp,
                }
            })?;
            let due_ticks = clock.ticks_until(due);
            while clock.ticks() < due_ticks {
                if !clock.advance(&cancel).await {
                    report.cancelled = true;
                    report.elapsed_ticks = clock.ticks();
                    return Ok(report);
                }
            }

            match ingest.push(event) {
                Ok(()) => {
                    report.released += 1;
                    self.metrics.record_event_released();
                    overflow_streak = 0;
                }
                Err(full) => {
                    let event = full.into_inner();
                    report.dropped += 1;
                    self.metrics.record_event_dropped();
                    overflow_streak += 1;
                    if overflow_streak == 1 {
                        warn!(
                            seq = event.sequence_number,
                            capacity = ingest.capacity(),
                            "Ingestion queue full, dropping events"
                        );
                    } else {
                        debug!(seq = event.sequence_number, "Dropped event");
                    }
                }
            }
        }

        report.elapsed_ticks = clock.ticks();
        info!(
            released = report.released,
            dropped = report.dropped,
            elapsed_ms = clock.elapsed().as_millis() as u64,
            cancelled = report.cancelled,
            "Event source finished"
        );
        Ok(report)
    }
}
