//! Validated string types that enforce invariants at construction time

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Validation errors for string types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("hostname cannot be empty or whitespace")]
    EmptyHostName,

    #[error("config path cannot be empty")]
    EmptyConfigPath,

    #[error("port cannot be 0")]
    InvalidPort,
}

/// Macro to generate validated string newtypes.
///
/// Each type gets a validating `new()`, `as_str()`, `AsRef<str>`, `Deref`,
/// `Display`, `TryFrom<String>`, `FromStr` and serde impls that validate on
/// deserialization.
macro_rules! validated_string {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident(String) {
            validation: |$s_param:ident| $validation:expr,
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
        #[serde(transparent)]
        $vis struct $name(String);

        impl $name {
            #[doc = concat!("Create a new ", stringify!($name), " after validation")]
            pub fn new($s_param: String) -> Result<Self, ValidationError> {
                let validate = || $validation;
                validate()?;
                Ok(Self($s_param))
            }

            #[doc = concat!("Get the ", stringify!($name), " as a string slice")]
            #[must_use]
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            #[inline]
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            #[inline]
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from($s_param: String) -> Result<Self, Self::Error> {
                Self::new($s_param)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::new(s).map_err(serde::de::Error::custom)
            }
        }
    };
}

validated_string! {
    /// A validated hostname that cannot be empty or whitespace-only
    ///
    /// # Examples
    /// ```
    /// use tickstats::types::HostName;
    ///
    /// let host = HostName::new("127.0.0.1".to_string()).unwrap();
    /// assert_eq!(host.as_str(), "127.0.0.1");
    ///
    /// assert!(HostName::new("   ".to_string()).is_err());
    /// ```
    #[doc(alias = "host")]
    pub struct HostName(String) {
        validation: |s| {
            if s.trim().is_empty() {
                Err(ValidationError::EmptyHostName)
            } else {
                Ok(())
            }
        },
    }
}

impl HostName {
    /// Loopback listener host
    #[must_use]
    pub fn localhost() -> Self {
        Self("127.0.0.1".to_string())
    }
}

validated_string! {
    /// Path to the TOML configuration file
    pub struct ConfigPath(String) {
        validation: |s| {
            if s.trim().is_empty() {
                Err(ValidationError::EmptyConfigPath)
            } else {
                Ok(())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_valid() {
        let host = HostName::new("localhost".to_string()).unwrap();
        assert_eq!(host.as_str(), "localhost");
    }

    #[test]
    fn test_hostname_whitespace_rejected() {
        let result = HostName::new(" \t\n ".to_string());
        assert!(matches!(result, Err(ValidationError::EmptyHostName)));
    }

    #[test]
    fn test_hostname_localhost() {
        assert_eq!(HostName::localhost().as_str(), "127.0.0.1");
    }

    #[test]
    fn test_hostname_serde_invalid() {
        let result: Result<HostName, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_hostname_deref() {
        let host = HostName::new("example.com".to_string()).unwrap();
        assert!(host.ends_with(".com"));
    }

    #[test]
    fn test_config_path_from_str() {
        let path: ConfigPath = "tickstats.toml".parse().unwrap();
        assert_eq!(path.as_str(), "tickstats.toml");
        assert_eq!(
            "".parse::<ConfigPath>(),
            Err(ValidationError::EmptyConfigPath)
        );
    }

    #[test]
    fn test_validation_error_display() {
        assert_eq!(
            ValidationError::EmptyHostName.to_string(),
            "hostname cannot be empty or whitespace"
        );
        assert_eq!(ValidationError::InvalidPort.to_string(), "port cannot be 0");
    }
}
