//! Core value types shared across the pipeline
//!
//! Validated configuration newtypes plus the identifier used to tag
//! subscriber sessions in logs and metrics.

pub mod config;
pub mod validated;

pub use config::{Port, QueueCapacity, ThreadCount, TickInterval};
pub use validated::{ConfigPath, HostName, ValidationError};

use uuid::Uuid;

/// Unique identifier for a subscriber session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new unique session ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
