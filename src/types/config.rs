//! Configuration-related type-safe wrappers using NonZero types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::{NonZeroU16, NonZeroU64, NonZeroUsize};
use std::time::Duration;

use super::ValidationError;

/// Generates a non-zero newtype with `new`/`get`, `Display`, `From` and
/// serde impls that reject zero at parse time.
macro_rules! nonzero_newtype {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident($nz:ty => $raw:ty) {
            zero_message: $zero_msg:literal,
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis struct $name($nz);

        impl $name {
            #[doc = concat!("Create a new ", stringify!($name), ", returning None if value is 0")]
            #[must_use]
            pub const fn new(value: $raw) -> Option<Self> {
                match <$nz>::new(value) {
                    Some(nz) => Some(Self(nz)),
                    None => None,
                }
            }

            #[doc = concat!("Get the value as ", stringify!($raw))]
            #[must_use]
            #[inline]
            pub const fn get(&self) -> $raw {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.get())
            }
        }

        impl From<$name> for $raw {
            fn from(value: $name) -> Self {
                value.get()
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                self.get().serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let value = <$raw>::deserialize(deserializer)?;
                Self::new(value).ok_or_else(|| serde::de::Error::custom($zero_msg))
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value: $raw = s
                    .trim()
                    .parse()
                    .map_err(|e| format!("invalid number '{}': {}", s, e))?;
                Self::new(value).ok_or_else(|| $zero_msg.to_string())
            }
        }
    };
}

nonzero_newtype! {
    /// A validated network port number that cannot be zero
    ///
    /// Port 0 asks the OS for an ephemeral port, which is never what a
    /// subscriber-facing listener wants.
    pub struct Port(NonZeroU16 => u16) {
        zero_message: "port cannot be 0",
    }
}

impl Port {
    /// Default subscriber listener port (8000)
    pub const DEFAULT: Self = Self(NonZeroU16::new(8000).unwrap());
}

impl Default for Port {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u16> for Port {
    type Error = ValidationError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(ValidationError::InvalidPort)
    }
}

nonzero_newtype! {
    /// A non-zero bounded queue capacity
    ///
    /// A zero-capacity queue would reject every item.
    pub struct QueueCapacity(NonZeroUsize => usize) {
        zero_message: "queue capacity cannot be 0",
    }
}

impl QueueCapacity {
    /// Ingestion queue default, sized to absorb feed bursts
    pub const INGEST: Self = Self(NonZeroUsize::new(512).unwrap());

    /// Output queue default, sized for subscriber lag
    pub const OUTPUT: Self = Self(NonZeroUsize::new(128).unwrap());
}

nonzero_newtype! {
    /// Pacing tick granularity in milliseconds
    pub struct TickInterval(NonZeroU64 => u64) {
        zero_message: "tick interval cannot be 0",
    }
}

impl TickInterval {
    /// One millisecond, the smallest spacing between feed records
    pub const DEFAULT: Self = Self(NonZeroU64::new(1).unwrap());

    /// Tick length as a `Duration`
    #[must_use]
    #[inline]
    pub const fn as_duration(&self) -> Duration {
        Duration::from_millis(self.get())
    }
}

impl Default for TickInterval {
    fn default() -> Self {
        Self::DEFAULT
    }
}

nonzero_newtype! {
    /// Number of tokio worker threads
    ///
    /// 1 selects the current-thread runtime.
    pub struct ThreadCount(NonZeroUsize => usize) {
        zero_message: "thread count cannot be 0",
    }
}

impl ThreadCount {
    /// Single-threaded cooperative scheduling
    pub const SINGLE: Self = Self(NonZeroUsize::new(1).unwrap());
}

impl Default for ThreadCount {
    fn default() -> Self {
        Self::SINGLE
    }
}
