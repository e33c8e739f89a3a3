//! Unified error type for listfeed
//!
//! Every component reports failures through [`FeedError`]. The
//! [`ErrorCategory`] of an error decides how hosts treat it: configuration
//! errors go back to the caller, storage errors are logged and leave prior
//! state in place, invariant errors degrade the affected item.

use serde::{Deserialize, Serialize};
use std::fmt;

/// High-level error categories for host error handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Malformed query, duplicate identifiers, stale snapshot, bad config file
    Config,
    /// Store fetch, commit or load failure
    Storage,
    /// A programming invariant was broken (e.g. a missing backing record)
    Invariant,
    /// Channel teardown and other internal failures
    Internal,
}

impl ErrorCategory {
    /// Whether the caller can fix the condition by changing its input.
    #[must_use]
    pub fn is_caller_correctable(&self) -> bool {
        matches!(self, Self::Config)
    }

    /// Whether the previously published state should be kept as-is.
    #[must_use]
    pub fn retains_prior_state(&self) -> bool {
        matches!(self, Self::Storage | Self::Config)
    }

    /// Short label for log lines.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Storage => "storage",
            Self::Invariant => "invariant",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Unified error type for all listfeed operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum FeedError {
    /// Query has no sort order, an empty key, or otherwise cannot run
    #[error("Invalid query: {message}")]
    InvalidQuery {
        /// What is wrong with the query
        message: String,
    },

    /// An item identifier appears more than once in a snapshot
    #[error("Duplicate item identifier in snapshot: {item}")]
    DuplicateItem {
        /// Debug rendering of the offending identifier
        item: String,
    },

    /// A section key appears more than once in a snapshot
    #[error("Duplicate section in snapshot: {section}")]
    DuplicateSection {
        /// Debug rendering of the offending section
        section: String,
    },

    /// A snapshot older than the rendered one was delivered
    #[error("Stale snapshot: generation {generation} is older than rendered generation {rendered}")]
    StaleSnapshot {
        /// Generation of the rejected snapshot
        generation: u64,
        /// Generation currently rendered
        rendered: u64,
    },

    /// Configuration file or override could not be used
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// What is wrong with the configuration
        message: String,
    },

    /// Store fetch, commit or load failed
    #[error("Storage error: {message}")]
    Storage {
        /// Error message describing the storage failure
        message: String,
    },

    /// An identifier did not resolve to a backing record
    #[error("Missing record for item {item}")]
    MissingRecord {
        /// Debug rendering of the unresolved identifier
        item: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl FeedError {
    /// Create an invalid query error
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Create a duplicate item error from any debuggable identifier
    pub fn duplicate_item(item: &impl fmt::Debug) -> Self {
        Self::DuplicateItem {
            item: format!("{item:?}"),
        }
    }

    /// Create a duplicate section error from any debuggable key
    pub fn duplicate_section(section: &impl fmt::Debug) -> Self {
        Self::DuplicateSection {
            section: format!("{section:?}"),
        }
    }

    /// Create a stale snapshot error
    pub fn stale_snapshot(generation: u64, rendered: u64) -> Self {
        Self::StaleSnapshot {
            generation,
            rendered,
        }
    }

    /// Create an invalid configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a missing record error
    pub fn missing_record(item: &impl fmt::Debug) -> Self {
        Self::MissingRecord {
            item: format!("{item:?}"),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Category used for routing this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidQuery { .. }
            | Self::DuplicateItem { .. }
            | Self::DuplicateSection { .. }
            | Self::StaleSnapshot { .. }
            | Self::InvalidConfig { .. } => ErrorCategory::Config,
            Self::Storage { .. } => ErrorCategory::Storage,
            Self::MissingRecord { .. } => ErrorCategory::Invariant,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Standard Result type for listfeed operations
pub type Result<T> = std::result::Result<T, FeedError>;

impl From<std::io::Error> for FeedError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err.to_string())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        Self::storage(format!("serialization: {err}"))
    }
}

impl From<toml::de::Error> for FeedError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            FeedError::duplicate_item(&7u32).category(),
            ErrorCategory::Config
        );
        assert_eq!(FeedError::storage("disk").category(), ErrorCategory::Storage);
        assert_eq!(
            FeedError::missing_record(&"x").category(),
            ErrorCategory::Invariant
        );
        assert!(ErrorCategory::Config.is_caller_correctable());
        assert!(!ErrorCategory::Invariant.retains_prior_state());
    }

    #[test]
    fn test_display_mentions_identifier() {
        let err = FeedError::duplicate_item(&42u64);
        assert_eq!(err.to_string(), "Duplicate item identifier in snapshot: 42");

        let err = FeedError::stale_snapshot(3, 5);
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains('5'));
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: FeedError = io.into();
        assert_eq!(err.category(), ErrorCategory::Storage);
    }
}
