//! Constants used throughout the pipeline
//!
//! Tunables that are not worth a config key live here.

use std::time::Duration;

/// Publisher constants
pub mod publisher {
    use super::Duration;

    /// Pause after a listener-level accept failure before retrying
    /// Keeps a persistent error (e.g. fd exhaustion) from spinning the loop
    pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

    /// Frames buffered per in-process subscriber before `send` waits
    pub const CHANNEL_FRAME_BUFFER: usize = 64;

    /// Upper bound on waiting for a WebSocket upgrade to complete
    pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Upper bound on waiting for a subscriber's readiness probe
    /// A silent client must not hold the single subscriber slot
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Pipeline supervision constants
pub mod pipeline {
    use super::Duration;

    /// How often the drain check runs after the feed is exhausted
    pub const DRAIN_POLL: Duration = Duration::from_millis(5);

    /// How long stages get to wind down after cancellation
    pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
}
