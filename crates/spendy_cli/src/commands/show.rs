//! Show command implementation.

use super::Ledger;
use serde::Serialize;
use spendy_ledger::SpendyState;
use spendy_store::Version;

/// What `show` prints.
#[derive(Debug, Serialize)]
pub struct ShowResult {
    /// Ledger object name.
    pub object: String,
    /// Version loaded.
    pub version: Version,
    /// The ledger.
    pub state: SpendyState,
}

/// Runs the show command.
pub async fn run(ledger: &Ledger, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let engine = ledger.open().await?;
    let result = ShowResult {
        object: engine.config().object_name.clone(),
        version: engine.version(),
        state: engine.state(),
    };
    engine.dispose();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "text" => print_text(&result),
        other => return Err(format!("Unknown format {other:?} (expected text or json)").into()),
    }
    Ok(())
}

fn print_text(result: &ShowResult) {
    let state = &result.state;

    println!("Ledger: {}", result.object);
    println!("  Version: {}", result.version);
    println!("  Payments: {}", state.payments.len());
    println!(
        "  Amazon orders: {} (US: {})",
        state.amazon_orders.len(),
        state.amazon_us_orders.len()
    );
    println!("  Manual matches: {}", state.manual_matches.len());

    println!();
    println!("Categories:");
    for category in &state.categories {
        let marker = if state.is_excluded(category) {
            " (excluded)"
        } else {
            ""
        };
        println!("  {category}{marker}");
    }

    if !state.patterns_to_categories.is_empty() {
        println!();
        println!("Patterns:");
        for (pattern, category) in &state.patterns_to_categories {
            println!("  {pattern:<30} {category}");
        }
    }
}
