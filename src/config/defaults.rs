//! Default values for configuration fields
//!
//! This module centralizes all default value functions used in serde deserialization.

use crate::types::{HostName, Port, QueueCapacity, ThreadCount, TickInterval};

/// Default ingestion lane capacity (events)
#[inline]
pub fn ingest_capacity() -> QueueCapacity {
    QueueCapacity::INGEST
}

/// Default output lane capacity (metric samples)
#[inline]
pub fn output_capacity() -> QueueCapacity {
    QueueCapacity::OUTPUT
}

/// Default pacing tick (1ms)
#[inline]
pub fn tick() -> TickInterval {
    TickInterval::DEFAULT
}

/// Default for holding the feed clock until a subscriber attaches
#[inline]
pub fn start_on_subscribe() -> bool {
    true
}

/// Default subscriber listener host (loopback only)
#[inline]
pub fn host() -> HostName {
    HostName::localhost()
}

/// Default subscriber listener port
#[inline]
pub fn port() -> Port {
    Port::DEFAULT
}

/// Default worker threads (single-threaded runtime)
#[inline]
pub fn threads() -> ThreadCount {
    ThreadCount::SINGLE
}
