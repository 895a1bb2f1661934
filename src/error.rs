//! Error types for the pipeline stages
//!
//! Only [`FeedError`] is fatal. Queue overflow and subscriber disconnects
//! are handled inside the stage that sees them and show up as counters.

use thiserror::Error;

/// Malformed or unusable input in the event feed
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FeedError {
    /// The record has no timestamp field
    #[error("line {line}: missing timestamp")]
    MissingTimestamp { line: u64 },

    /// The timestamp field is not a decimal number
    #[error("line {line}: invalid timestamp '{value}'")]
    InvalidTimestamp { line: u64, value: String },

    /// Negative, infinite or NaN timestamps cannot be paced
    #[error("line {line}: timestamp {value} is not a non-negative finite number")]
    NegativeTimestamp { line: u64, value: f64 },

    /// Timestamps must be non-decreasing
    #[error("record {record}: timestamp {value} is earlier than previous timestamp {previous}")]
    NonMonotonic { record: u64, previous: f64, value: f64 },

    /// An in-memory event carried a time the pacer cannot wait for
    #[error("record {record}: timestamp {value} cannot be paced")]
    Unpaceable { record: u64, value: f64 },

    /// Reading the feed failed
    #[error("failed to read feed: {0}")]
    Io(#[from] std::io::Error),
}

/// Subscriber transport failures
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubscriberError {
    /// The subscriber closed the connection
    #[error("subscriber disconnected")]
    Disconnected,

    /// The connection never produced a usable readiness probe
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Any other transport-level failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl SubscriberError {
    /// Check if this error means the peer went away
    ///
    /// Transport errors are treated as a lost connection too: the session
    /// cannot continue either way.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Transport(_))
    }
}

/// Errors that end a pipeline run
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// The feed could not be read or parsed
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// The subscriber listener could not be bound
    #[error("failed to bind subscriber listener on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// A stage task panicked or was aborted
    #[error("pipeline stage '{stage}' failed: {reason}")]
    Join { stage: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_error_display_includes_line() {
        let err = FeedError::InvalidTimestamp {
            line: 7,
            value: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "line 7: invalid timestamp 'abc'");
    }

    #[test]
    fn test_feed_error_non_monotonic_display() {
        let err = FeedError::NonMonotonic {
            record: 3,
            previous: 0.5,
            value: 0.25,
        };
        let msg = err.to_string();
        assert!(msg.contains("record 3"));
        assert!(msg.contains("0.25"));
        assert!(msg.contains("0.5"));
    }

    #[test]
    fn test_feed_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: FeedError = io.into();
        assert!(matches!(err, FeedError::Io(_)));
    }

    #[test]
    fn test_subscriber_error_is_disconnect() {
        assert!(SubscriberError::Disconnected.is_disconnect());
        assert!(SubscriberError::Transport("reset".to_string()).is_disconnect());
        assert!(!SubscriberError::Handshake("no probe".to_string()).is_disconnect());
    }

    #[test]
    fn test_pipeline_error_from_feed_is_transparent() {
        let err: PipelineError = FeedError::MissingTimestamp { line: 2 }.into();
        assert_eq!(err.to_string(), "line 2: missing timestamp");
    }
}
