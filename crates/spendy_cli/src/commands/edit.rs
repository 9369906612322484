//! Commands that change the ledger.
//!
//! Each run loads the ledger, applies one action and saves right away
//! instead of waiting for the debounce window.

use super::Ledger;
use spendy_ledger::{LedgerEngine, SpendyAction};
use spendy_store::{DirectoryStore, Version};
use spendy_sync_engine::SaveOutcome;
use tracing::info;

/// Conflicting saves tolerated before giving up.
const MAX_ATTEMPTS: usize = 5;

/// Applies `action` to the ledger and saves it.
pub async fn run(ledger: &Ledger, action: SpendyAction) -> Result<(), Box<dyn std::error::Error>> {
    let engine = ledger.open().await?;
    info!(action = action.name(), "applying");
    engine.dispatch(action)?;

    let saved = save(&engine).await;
    engine.dispose();
    let version = saved?;

    println!("✓ Ledger saved");
    println!("  Version: {version}");
    Ok(())
}

async fn save(
    engine: &LedgerEngine<DirectoryStore>,
) -> Result<Version, Box<dyn std::error::Error>> {
    for attempt in 1..=MAX_ATTEMPTS {
        match engine.flush().await {
            SaveOutcome::Saved { version, .. } => return Ok(version),
            SaveOutcome::UpToDate => return Ok(engine.version()),
            SaveOutcome::Reconciled { replayed, .. } => {
                info!(attempt, replayed, "ledger changed concurrently, saving again");
            }
            SaveOutcome::Failed { kind, message } => {
                return Err(format!("Ledger not saved ({kind:?}): {message}").into())
            }
            SaveOutcome::Skipped => {
                return Err("Another save of the ledger is still in progress".into())
            }
            SaveOutcome::Disposed => {
                return Err("Ledger was closed before it could be saved".into())
            }
        }
    }
    Err(format!("Gave up after {MAX_ATTEMPTS} conflicting saves").into())
}
