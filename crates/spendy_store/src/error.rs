//! Error types for store operations.

use crate::payload::Version;
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while loading or saving remote objects.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object moved on since the supplied version was observed.
    #[error("version conflict: expected {expected}, store has {}", display_actual(.actual))]
    Conflict {
        /// Version the caller supplied.
        expected: Version,
        /// Version the store currently holds, when known.
        actual: Option<Version>,
    },

    /// A create (none version) raced with another writer's create.
    #[error("object {name} already exists")]
    AlreadyExists {
        /// Object name.
        name: String,
    },

    /// Network or transport failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Local I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The object name cannot be used as a storage key.
    #[error("invalid object name: {0:?}")]
    InvalidObjectName(String),

    /// The remote side answered with something we could not interpret.
    #[error("protocol error: {0}")]
    Protocol(String),
}

fn display_actual(actual: &Option<Version>) -> String {
    actual
        .as_ref()
        .map_or_else(|| "an unknown version".to_string(), Version::to_string)
}

impl StoreError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the write was rejected because another writer got
    /// there first. Both stale updates and racing creates count.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::AlreadyExists { .. })
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { retryable, .. } => *retryable,
            Self::Io(_) => true,
            _ => false,
        }
    }
}
