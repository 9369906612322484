//! CLI command implementations.

pub mod edit;
pub mod keygen;
pub mod show;

use spendy_crypto::AesGcmCipher;
use spendy_ledger::{open_ledger_with, LedgerEngine};
use spendy_store::DirectoryStore;
use spendy_sync_engine::{EngineConfig, FailureKind, SyncStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Where a ledger lives and how to read it.
#[derive(Clone)]
pub struct Ledger {
    dir: PathBuf,
    key: String,
    name: String,
}

impl Ledger {
    /// Creates a ledger location.
    pub fn new(dir: PathBuf, key: String, name: String) -> Self {
        Self { dir, key, name }
    }

    /// Opens and loads the ledger.
    ///
    /// Unlike the engine, which treats an unreadable object as absent, the
    /// CLI refuses to continue: a wrong key would otherwise overwrite the
    /// ledger with an empty one on the next save.
    pub async fn open(
        &self,
    ) -> Result<Arc<LedgerEngine<DirectoryStore>>, Box<dyn std::error::Error>> {
        let cipher = AesGcmCipher::from_encoded_key(&self.key)?;
        let store = DirectoryStore::open(&self.dir)?;
        debug!(dir = %self.dir.display(), object = %self.name, "opening ledger");

        let engine = open_ledger_with(EngineConfig::new(&self.name), store, Arc::new(cipher));
        engine.start().await?;

        match engine.status() {
            SyncStatus::Failed {
                kind: FailureKind::DecryptFailed,
                message,
            } => {
                engine.dispose();
                Err(format!("Cannot decrypt ledger {:?} (wrong key?): {message}", self.name).into())
            }
            SyncStatus::Failed { kind, message } => {
                engine.dispose();
                Err(format!("Cannot load ledger {:?} ({kind:?}): {message}", self.name).into())
            }
            _ => Ok(engine),
        }
    }
}
