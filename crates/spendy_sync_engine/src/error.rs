//! Error types for the sync engine.

use spendy_crypto::CryptoError;
use spendy_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Most failures never reach the caller: the engine recovers from them and
/// reports them through [`SyncStatus`](crate::SyncStatus). These are the
/// errors returned by the engine's own methods.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Remote store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Encryption or decryption error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// State could not be serialized or deserialized.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The engine has not been started.
    #[error("sync engine not started")]
    NotStarted,

    /// The engine has been disposed.
    #[error("sync engine disposed")]
    Disposed,

    /// Invalid state transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl SyncError {
    /// Returns true if the store rejected a write because of a lost race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::Store(e) if e.is_conflict())
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}
