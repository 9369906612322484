//! Persisted ledger state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One line of a bank statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// ISO date, `YYYY-MM-DD`.
    pub date: String,
    /// Statement description; category patterns match against this.
    pub description: String,
    /// Signed amount in minor currency units.
    pub amount: i64,
    /// Line number within the imported statement.
    pub line: u32,
}

impl Payment {
    fn sort_key(&self) -> (&str, &str, i64, u32) {
        (&self.date, &self.description, self.amount, self.line)
    }
}

impl PartialOrd for Payment {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Payment {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// An order from an Amazon order history export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmazonOrder {
    /// Amazon order identifier.
    pub order_id: String,
    /// Items of the order, as payments.
    pub items: Vec<Payment>,
    /// Order total in minor currency units.
    pub total: i64,
}

/// A user-confirmed link between bank payments and Amazon orders.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManualMatch {
    /// Matched payment keys.
    pub payments: Vec<String>,
    /// Matched order identifiers.
    pub orders: Vec<String>,
}

/// Everything Spendy persists.
///
/// Serialized with camelCase field names. Missing fields deserialize to
/// their empty value so older objects stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpendyState {
    /// Imported payments, sorted and free of adjacent duplicates.
    pub payments: Vec<Payment>,
    /// Distinct categories in use, sorted.
    pub categories: Vec<String>,
    /// Description pattern to normalized category.
    pub patterns_to_categories: BTreeMap<String, String>,
    /// Categories excluded from totals.
    pub excluded_categories: Vec<String>,
    /// Orders from the UK store.
    pub amazon_orders: Vec<AmazonOrder>,
    /// Orders from the US store.
    pub amazon_us_orders: Vec<AmazonOrder>,
    /// Manual payment/order matches, in creation order.
    pub manual_matches: Vec<ManualMatch>,
}

impl SpendyState {
    /// Returns the category assigned to `pattern`, if any.
    pub fn category_of(&self, pattern: &str) -> Option<&str> {
        self.patterns_to_categories.get(pattern).map(String::as_str)
    }

    /// Returns true if `category` or one of its ancestors is excluded.
    pub fn is_excluded(&self, category: &str) -> bool {
        let category = format!("{category}/");
        self.excluded_categories
            .iter()
            .any(|excluded| category.starts_with(&format!("{excluded}/")))
    }
}
