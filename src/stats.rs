//! Streaming statistics over inter-arrival deltas
//!
//! [`RunningStats`] keeps Welford's aggregate (count, mean, M2) so mean and
//! variance stay numerically stable over an unbounded stream.
//! [`StatsEngine`] owns one `RunningStats` exclusively and turns each event
//! after the first into a [`MetricSample`].

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::fabric::Lane;
use crate::feed::Event;
use crate::metrics::PipelineMetrics;

/// Welford's online mean/variance aggregate
///
/// Invariants: `count == 0` implies `mean == 0` and `m2 == 0`; `m2 >= 0`.
///
/// # Example
///
/// ```
/// use tickstats::stats::RunningStats;
///
/// let mut stats = RunningStats::new();
/// for delta in [0.002, 0.003] {
///     stats.push(delta);
/// }
///
/// assert_eq!(stats.count(), 2);
/// assert!((stats.mean() - 0.0025).abs() < 1e-12);
/// assert!((stats.std_dev().unwrap() - 0.0005).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    /// Sum of squared deviations from the running mean
    m2: f64,
}

impl RunningStats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Fold one observation into the aggregate
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let d1 = value - self.mean;
        self.mean += d1 / self.count as f64;
        let d2 = value - self.mean;
        self.m2 += d1 * d2;
    }

    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    #[must_use]
    pub const fn m2(&self) -> f64 {
        self.m2
    }

    /// Population variance, `None` before the first observation
    #[must_use]
    pub fn variance(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.m2 / self.count as f64)
        }
    }

    /// Sample variance with Bessel's correction, `None` below two observations
    #[must_use]
    pub fn sample_variance(&self) -> Option<f64> {
        if self.count < 2 {
            None
        } else {
            Some(self.m2 / (self.count - 1) as f64)
        }
    }

    /// Population standard deviation
    #[must_use]
    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }
}

/// One computed metric, produced per event after the first
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSample {
    /// Sequence number of the event that produced this sample
    pub sequence_number: u64,
    /// Seconds since the previous event
    pub delta: f64,
    /// Number of deltas folded in so far
    pub count: u64,
    pub mean: f64,
    /// Population standard deviation of the deltas so far
    pub std_dev: f64,
}

/// Engine state: whether a baseline timestamp exists yet
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum EngineState {
    /// No event seen yet
    #[default]
    Uninitialized,
    /// At least one event seen; carries its timestamp
    Tracking { previous_timestamp: f64 },
}

/// Consumes events in arrival order and derives metric samples
#[derive(Debug, Default)]
pub struct StatsEngine {
    state: EngineState,
    stats: RunningStats,
}

impl StatsEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one event
    ///
    /// The first event only records the baseline timestamp and yields
    /// nothing. Every later event yields exactly one sample.
    pub fn observe(&mut self, event: &Event) -> Option<MetricSample> {
        match self.state {
            EngineState::Uninitialized => {
                self.state = EngineState::Tracking {
                    previous_timestamp: event.timestamp,
                };
                None
            }
            EngineState::Tracking { previous_timestamp } => {
                let delta = event.timestamp - previous_timestamp;
                self.state = EngineState::Tracking {
                    previous_timestamp: event.timestamp,
                };
                self.stats.push(delta);

                Some(MetricSample {
                    sequence_number: event.sequence_number,
                    delta,
                    count: self.stats.count(),
                    mean: self.stats.mean(),
                    // count >= 1 here, so the variance is always defined
                    std_dev: self.stats.std_dev().unwrap_or(0.0),
                })
            }
        }
    }

    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    #[must_use]
    pub const fn stats(&self) -> &RunningStats {
        &self.stats
    }

    /// Drain the ingestion lane until cancelled
    ///
    /// Samples that do not fit in the output lane are dropped and counted.
    pub async fn run(
        mut self,
        ingest: Arc<Lane<Event>>,
        output: Arc<Lane<MetricSample>>,
        metrics: Arc<PipelineMetrics>,
        cancel: CancellationToken,
    ) -> RunningStats {
        info!("Stats engine started");
        let mut overflow_streak: u64 = 0;

        while let Some(event) = ingest.recv(&cancel).await {
            // Counted only after the sample (if any) is accounted for, so a
            // caught-up engine never has a sample in flight
            let Some(sample) = self.observe(&event) else {
                debug!(
                    seq = event.sequence_number,
                    timestamp = event.timestamp,
                    "Baseline timestamp recorded"
                );
                metrics.record_event_processed();
                continue;
            };

            match output.push(sample) {
                Ok(()) => {
                    metrics.record_sample_emitted();
                    if overflow_streak > 0 {
                        info!(
                            dropped = overflow_streak,
                            "Output queue accepting samples again"
                        );
                        overflow_streak = 0;
                    }
                }
                Err(full) => {
                    metrics.record_sample_dropped();
                    overflow_streak += 1;
                    let dropped = full.into_inner();
                    if overflow_streak == 1 {
                        warn!(
                            seq = dropped.sequence_number,
                            capacity = output.capacity(),
                            "Output queue full, dropping metric samples"
                        );
                    } else {
                        debug!(seq = dropped.sequence_number, "Dropped metric sample");
                    }
                }
            }
            metrics.record_event_processed();
        }

        info!(
            count = self.stats.count(),
            mean = self.stats.mean(),
            "Stats engine stopped"
        );
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn naive_mean_std(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        (mean, var.sqrt())
    }

    #[test]
    fn test_running_stats_empty() {
        let stats = RunningStats::new();
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.m2(), 0.0);
        assert_eq!(stats.variance(), None);
        assert_eq!(stats.std_dev(), None);
    }

    #[test]
    fn test_running_stats_single_value() {
        let mut stats = RunningStats::new();
        stats.push(0.002);
        assert_eq!(stats.count(), 1);
        assert!((stats.mean() - 0.002).abs() < EPS);
        assert_eq!(stats.variance(), Some(0.0));
        assert_eq!(stats.std_dev(), Some(0.0));
        assert_eq!(stats.sample_variance(), None);
    }

    #[test]
    fn test_running_stats_matches_two_pass() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut stats = RunningStats::new();
        for v in values {
            stats.push(v);
        }
        let (mean, std) = naive_mean_std(&values);
        assert!((stats.mean() - mean).abs() < EPS);
        assert!((stats.std_dev().unwrap() - std).abs() < EPS);
        assert!((stats.variance().unwrap() - 4.0).abs() < EPS);
        assert!((stats.sample_variance().unwrap() - 32.0 / 7.0).abs() < EPS);
    }

    #[test]
    fn test_running_stats_large_offset_stable() {
        // Naive sum-of-squares loses everything here; Welford does not
        let mut stats = RunningStats::new();
        for v in [1e9 + 4.0, 1e9 + 7.0, 1e9 + 13.0, 1e9 + 16.0] {
            stats.push(v);
        }
        assert!((stats.variance().unwrap() - 22.5).abs() < 1e-6);
    }

    #[test]
    fn test_engine_first_event_is_baseline_only() {
        let mut engine = StatsEngine::new();
        assert_eq!(engine.state(), EngineState::Uninitialized);

        assert_eq!(engine.observe(&Event::new(1, 0.7)), None);
        assert_eq!(
            engine.state(),
            EngineState::Tracking {
                previous_timestamp: 0.7
            }
        );
        assert_eq!(engine.stats().count(), 0);
    }

    #[test]
    fn test_engine_three_event_scenario() {
        let mut engine = StatsEngine::new();
        assert!(engine.observe(&Event::new(1, 0.0)).is_none());

        let first = engine.observe(&Event::new(2, 0.002)).unwrap();
        assert_eq!(first.sequence_number, 2);
        assert!((first.delta - 0.002).abs() < EPS);
        assert_eq!(first.count, 1);
        assert!((first.mean - 0.002).abs() < EPS);
        assert_eq!(first.std_dev, 0.0);

        let second = engine.observe(&Event::new(3, 0.005)).unwrap();
        assert_eq!(second.sequence_number, 3);
        assert!((second.delta - 0.003).abs() < EPS);
        assert_eq!(second.count, 2);
        assert!((second.mean - 0.0025).abs() < EPS);
        assert!((second.std_dev - 0.0005).abs() < EPS);
    }

    #[test]
    fn test_engine_zero_delta() {
        let mut engine = StatsEngine::new();
        engine.observe(&Event::new(1, 1.0));
        let sample = engine.observe(&Event::new(2, 1.0)).unwrap();
        assert_eq!(sample.delta, 0.0);
        assert_eq!(sample.mean, 0.0);
        assert_eq!(sample.std_dev, 0.0);
    }

    #[test]
    fn test_engine_m2_never_negative() {
        let mut engine = StatsEngine::new();
        let timestamps = [0.0, 0.001, 0.001, 0.010, 0.011, 0.5, 0.5001, 3.0];
        for (i, ts) in timestamps.iter().enumerate() {
            engine.observe(&Event::new(i as u64 + 1, *ts));
            assert!(engine.stats().m2() >= 0.0);
        }
        assert_eq!(engine.stats().count(), timestamps.len() as u64 - 1);
    }

    #[tokio::test]
    async fn test_engine_run_emits_in_order() {
        let ingest = Arc::new(Lane::new(16));
        let output = Arc::new(Lane::new(16));
        let metrics = Arc::new(PipelineMetrics::new());
        let cancel = CancellationToken::new();

        for (seq, ts) in [(1, 0.0), (2, 0.1), (3, 0.3), (4, 0.6)] {
            ingest.push(Event::new(seq, ts)).unwrap();
        }

        let task = tokio::spawn(StatsEngine::new().run(
            ingest.clone(),
            output.clone(),
            metrics.clone(),
            cancel.clone(),
        ));

        let mut seen = Vec::new();
        while seen.len() < 3 {
            if let Some(sample) = output.recv(&cancel).await {
                seen.push(sample.sequence_number);
            }
        }
        cancel.cancel();
        let stats = task.await.unwrap();

        assert_eq!(seen, vec![2, 3, 4]);
        assert_eq!(stats.count(), 3);
        let snap = metrics.snapshot();
        assert_eq!(snap.events_processed, 4);
        assert_eq!(snap.samples_emitted, 3);
    }

    #[tokio::test]
    async fn test_engine_run_counts_output_overflow() {
        let ingest = Arc::new(Lane::new(16));
        let output = Arc::new(Lane::new(1));
        let metrics = Arc::new(PipelineMetrics::new());
        let cancel = CancellationToken::new();

        for seq in 1..=4u64 {
            ingest.push(Event::new(seq, seq as f64)).unwrap();
        }

        let task = tokio::spawn(StatsEngine::new().run(
            ingest.clone(),
            output.clone(),
            metrics.clone(),
            cancel.clone(),
        ));

        while metrics.snapshot().events_processed < 4 {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        task.await.unwrap();

        let snap = metrics.snapshot();
        assert_eq!(snap.samples_emitted, 1);
        assert_eq!(snap.samples_dropped, 2);
        // The one that fit is the oldest
        assert_eq!(output.try_recv().map(|s| s.sequence_number), Some(2));
    }
}
