//! Lock-free pipeline counters
//!
//! Every stage holds an `Arc<PipelineMetrics>` and bumps its own counters;
//! nothing here is read back by the stages themselves except the
//! drain check in [`Pipeline`](crate::pipeline::Pipeline).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the three pipeline stages
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    events_released: AtomicU64,
    events_dropped: AtomicU64,
    events_processed: AtomicU64,
    samples_emitted: AtomicU64,
    samples_dropped: AtomicU64,
    samples_sent: AtomicU64,
    samples_discarded: AtomicU64,
    send_failures: AtomicU64,
    sessions_accepted: AtomicU64,
    sessions_closed: AtomicU64,
}

impl PipelineMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Event Source

    #[inline]
    pub fn record_event_released(&self) {
        self.events_released.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_event_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    // Stats Engine

    #[inline]
    pub fn record_event_processed(&self) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sample_emitted(&self) {
        self.samples_emitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sample_dropped(&self) {
        self.samples_dropped.fetch_add(1, Ordering::Relaxed);
    }

    // Publisher

    #[inline]
    pub fn record_sample_sent(&self) {
        self.samples_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_samples_discarded(&self, count: u64) {
        self.samples_discarded.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_session_accepted(&self) {
        self.sessions_accepted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_session_closed(&self) {
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of every counter
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_released: self.events_released.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            events_processed: self.events_processed.load(Ordering::Relaxed),
            samples_emitted: self.samples_emitted.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            samples_sent: self.samples_sent.load(Ordering::Relaxed),
            samples_discarded: self.samples_discarded.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            sessions_accepted: self.sessions_accepted.load(Ordering::Relaxed),
            sessions_closed: self.sessions_closed.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`PipelineMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub events_released: u64,
    pub events_dropped: u64,
    pub events_processed: u64,
    pub samples_emitted: u64,
    pub samples_dropped: u64,
    pub samples_sent: u64,
    pub samples_discarded: u64,
    pub send_failures: u64,
    pub sessions_accepted: u64,
    pub sessions_closed: u64,
}

impl MetricsSnapshot {
    /// The engine has consumed every event the pacer managed to enqueue
    #[must_use]
    pub const fn engine_caught_up(&self) -> bool {
        self.events_processed >= self.events_released
    }

    /// Every emitted sample was sent, discarded or lost in a failed send
    #[must_use]
    pub const fn publisher_caught_up(&self) -> bool {
        self.samples_sent + self.samples_discarded + self.send_failures >= self.samples_emitted
    }

    /// Items lost to queue overflow on either hop
    #[must_use]
    pub const fn overflow_losses(&self) -> u64 {
        self.events_dropped + self.samples_dropped
    }

    /// A subscriber session is currently open
    #[must_use]
    pub const fn session_active(&self) -> bool {
        self.sessions_accepted > self.sessions_closed
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "events released={} dropped={} processed={}, samples emitted={} dropped={} sent={} discarded={} failed={}, sessions accepted={} closed={}",
            self.events_released,
            self.events_dropped,
            self.events_processed,
            self.samples_emitted,
            self.samples_dropped,
            self.samples_sent,
            self.samples_discarded,
            self.send_failures,
            self.sessions_accepted,
            self.sessions_closed,
        )
    }
}
