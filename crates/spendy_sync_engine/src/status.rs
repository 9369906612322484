//! Observable engine state, status and statistics.

use spendy_store::Version;
use std::fmt;
use std::time::Instant;

/// Lifecycle state of the engine.
///
/// `Uninitialized → Loading → Idle ⇄ SaveInFlight ⇄ Reconciling`, with
/// `Idle` as the resting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, `start` not called yet.
    Uninitialized,
    /// Initial load in flight.
    Loading,
    /// Nothing in flight.
    Idle,
    /// A conditional save is in flight.
    SaveInFlight,
    /// Reloading remote truth after a conflict.
    Reconciling,
}

impl EngineState {
    /// Returns true if a store round trip is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            EngineState::Loading | EngineState::SaveInFlight | EngineState::Reconciling
        )
    }

    /// Returns true if a save may start.
    pub fn can_start_save(&self) -> bool {
        matches!(self, EngineState::Idle)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Which operation a reported failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Initial load failed; the engine fell back to the initial state.
    LoadFailed,
    /// Stored object could not be decrypted; treated as absent.
    DecryptFailed,
    /// Stored object decrypted but did not deserialize; treated as absent.
    DecodeFailed,
    /// A save failed for a reason other than a conflict.
    SaveFailed,
    /// The reload after a conflict failed.
    ReconcileFailed,
}

/// Human-facing sync status, published on every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// Not started.
    Idle,
    /// Initial load in flight.
    Loading,
    /// Initial load completed.
    Loaded {
        /// Version observed.
        version: Version,
    },
    /// A save is scheduled.
    SavingSoon,
    /// A save is in flight.
    Saving,
    /// The last save succeeded.
    Saved {
        /// Version produced by the save.
        version: Version,
    },
    /// Reloading and replaying after a conflict.
    Reconciling,
    /// Something failed; the engine recovered as well as it could.
    Failed {
        /// Failing operation.
        kind: FailureKind,
        /// Error message.
        message: String,
    },
}

impl SyncStatus {
    /// Returns true for failure statuses.
    pub fn is_failure(&self) -> bool {
        matches!(self, SyncStatus::Failed { .. })
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Idle => f.write_str(""),
            SyncStatus::Loading => f.write_str("Loading..."),
            SyncStatus::Loaded { version } => write!(f, "Loaded version {version}"),
            SyncStatus::SavingSoon => f.write_str("Saving soon"),
            SyncStatus::Saving => f.write_str("Saving..."),
            SyncStatus::Saved { .. } => f.write_str("Saved successfully"),
            SyncStatus::Reconciling => f.write_str("Reconciling"),
            SyncStatus::Failed { kind, message } => write!(f, "{kind:?}: {message}"),
        }
    }
}

/// Statistics about the engine's store round trips.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Actions accepted by `dispatch`.
    pub actions_dispatched: u64,
    /// Saves accepted by the store.
    pub saves_completed: u64,
    /// Saves that failed for reasons other than a conflict.
    pub save_failures: u64,
    /// Saves rejected because another writer got there first.
    pub conflicts: u64,
    /// Completed reload-and-replay cycles.
    pub reconciliations: u64,
    /// Failed loads (initial or during reconciliation).
    pub load_failures: u64,
    /// Stored objects that could not be decrypted or decoded.
    pub decrypt_failures: u64,
    /// Time of the last accepted save.
    pub last_save_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}
