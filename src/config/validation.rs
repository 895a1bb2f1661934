//! Configuration validation
//!
//! Zero capacities, ticks and ports, and empty hosts, are already rejected
//! by the newtypes at parse time. This checks the remaining constraints.

use anyhow::Result;
use std::time::Duration;

use super::types::Config;

/// Longest accepted pacing tick
pub const MAX_TICK: Duration = Duration::from_secs(1);

impl Config {
    /// Validate configuration for correctness
    ///
    /// - The pacing tick must not exceed [`MAX_TICK`]
    /// - An output lane larger than the ingest lane only draws a warning
    pub fn validate(&self) -> Result<()> {
        let tick = self.pipeline.tick_ms.as_duration();
        if tick > MAX_TICK {
            return Err(anyhow::anyhow!(
                "pipeline.tick_ms is {}ms; pacing ticks longer than {:?} are not supported",
                self.pipeline.tick_ms,
                MAX_TICK
            ));
        }

        if self.pipeline.output_capacity.get() > self.pipeline.ingest_capacity.get() {
            tracing::warn!(
                "pipeline.output_capacity ({}) exceeds pipeline.ingest_capacity ({}). \
                 The output lane can never hold more samples than events that arrived.",
                self.pipeline.output_capacity,
                self.pipeline.ingest_capacity
            );
        }

        Ok(())
    }
}
