//! # Spendy Sync Engine
//!
//! Keeps a reducer-driven application state in sync with an encrypted
//! object in a remote store.
//!
//! The engine:
//! - Applies every dispatched action locally and immediately
//! - Debounces saves, so a burst of edits becomes one write
//! - Writes conditionally on the last version it saw
//! - On a lost race, reloads remote truth and replays the queued actions on
//!   top of it before trying again
//!
//! ## Components
//!
//! - [`Reducer`]: pure state transition function
//! - [`ActionLog`]: actions applied locally but not yet confirmed durable
//! - [`Debouncer`] and [`Scheduler`]: the deferred save trigger
//! - [`SyncEngine`]: the state machine tying them to a
//!   [`RemoteStore`](spendy_store::RemoteStore) and a
//!   [`Cipher`](spendy_crypto::Cipher)
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized ──start──► Loading ──► Idle ⇄ SaveInFlight
//!                                        ▲          │ conflict
//!                                        └─ Reconciling ◄┘
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod action_log;
mod config;
mod engine;
mod error;
mod reducer;
mod scheduler;
mod status;

pub use action_log::ActionLog;
pub use config::{BackoffConfig, EngineConfig, DEFAULT_DEBOUNCE};
pub use engine::{wait_until_settled, SaveOutcome, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use reducer::Reducer;
pub use scheduler::{Debouncer, ManualScheduler, Scheduler, TimerHandle, TimerTask, TokioScheduler};
pub use status::{EngineState, FailureKind, SyncStats, SyncStatus};
