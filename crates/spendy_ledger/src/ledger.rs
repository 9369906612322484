//! Wiring the ledger to the sync engine.

use crate::action::SpendyAction;
use crate::reducer::SpendyReducer;
use crate::state::SpendyState;
use spendy_crypto::Cipher;
use spendy_store::RemoteStore;
use spendy_sync_engine::{EngineConfig, SyncEngine};
use std::sync::Arc;
use tracing::debug;

/// Name of the remote object holding the ledger.
pub const OBJECT_NAME: &str = "spendy";

/// A sync engine persisting [`SpendyState`].
pub type LedgerEngine<S> = SyncEngine<S, SpendyReducer, SpendyState, SpendyAction>;

/// Creates a ledger engine over `store` with the default configuration.
///
/// The engine still has to be started.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn open_ledger<S: RemoteStore>(store: S, cipher: Arc<dyn Cipher>) -> Arc<LedgerEngine<S>> {
    open_ledger_with(EngineConfig::new(OBJECT_NAME), store, cipher)
}

/// Creates a ledger engine with an explicit configuration.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn open_ledger_with<S: RemoteStore>(
    config: EngineConfig,
    store: S,
    cipher: Arc<dyn Cipher>,
) -> Arc<LedgerEngine<S>> {
    debug!(object = %config.object_name, debounce = ?config.debounce, "opening ledger");
    SyncEngine::new(config, store, cipher, SpendyReducer, SpendyState::default())
}
