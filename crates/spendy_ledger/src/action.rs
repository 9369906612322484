//! Ledger actions.

use crate::state::{AmazonOrder, Payment};

/// An edit to the ledger.
///
/// Actions carry everything the reducer needs: statements and order
/// histories are parsed before dispatch, so replaying an action always gives
/// the same result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpendyAction {
    /// Maps a description pattern to a category.
    SetCategory {
        /// Description pattern.
        pattern: String,
        /// Category, normalized when applied.
        category: String,
    },
    /// Renames a category and all of its `/`-descendants.
    RenameCategory {
        /// Current category name.
        category: String,
        /// New name, normalized when applied.
        renamed: String,
    },
    /// Includes or excludes a category (and its descendants) from totals.
    ExcludeCategory {
        /// Category, normalized when applied.
        category: String,
        /// Whether the category is excluded afterwards.
        excluded: bool,
    },
    /// Adds parsed bank statement lines.
    AddPayments {
        /// New payments, in any order.
        payments: Vec<Payment>,
    },
    /// Replaces the imported Amazon order history.
    ImportAmazonOrders {
        /// Parsed orders.
        orders: Vec<AmazonOrder>,
        /// True for the US store, false for the UK store.
        us: bool,
    },
    /// Records a manual match between payments and orders.
    SaveManualMatch {
        /// Matched payment keys.
        payments: Vec<String>,
        /// Matched order identifiers.
        orders: Vec<String>,
    },
}

impl SpendyAction {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            SpendyAction::SetCategory { .. } => "set_category",
            SpendyAction::RenameCategory { .. } => "rename_category",
            SpendyAction::ExcludeCategory { .. } => "exclude_category",
            SpendyAction::AddPayments { .. } => "add_payments",
            SpendyAction::ImportAmazonOrders { .. } => "import_amazon_orders",
            SpendyAction::SaveManualMatch { .. } => "save_manual_match",
        }
    }
}
