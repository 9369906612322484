//! The ledger reducer.

use crate::action::SpendyAction;
use crate::state::{ManualMatch, SpendyState};
use spendy_sync_engine::Reducer;
use std::collections::{BTreeMap, BTreeSet};

/// Normalizes a category name.
///
/// Strips leading and trailing whitespace and slashes, collapses each
/// internal whitespace run into a single `-` and lower-cases the result.
/// `/` separates a category from its subcategories.
///
/// ```rust
/// use spendy_ledger::normalize_category;
///
/// assert_eq!(normalize_category("Groceries "), "groceries");
/// assert_eq!(normalize_category("/Eating  Out/"), "eating-out");
/// assert_eq!(normalize_category("Food/Take Away"), "food/take-away");
/// ```
pub fn normalize_category(category: &str) -> String {
    let trimmed = category.trim_matches(|c: char| c.is_whitespace() || c == '/');

    let mut normalized = String::with_capacity(trimmed.len());
    let mut in_whitespace = false;
    for c in trimmed.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                normalized.push('-');
            }
            in_whitespace = true;
        } else {
            in_whitespace = false;
            normalized.extend(c.to_lowercase());
        }
    }
    normalized
}

/// Distinct categories referenced by the pattern map, sorted.
fn categories_of(patterns: &BTreeMap<String, String>) -> Vec<String> {
    patterns
        .values()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Returns true if `category` is `ancestor` or one of its descendants.
fn is_within(category: &str, ancestor: &str) -> bool {
    format!("{category}/").starts_with(&format!("{ancestor}/"))
}

/// The Spendy reducer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpendyReducer;

impl Reducer<SpendyState, SpendyAction> for SpendyReducer {
    fn reduce(&self, state: &SpendyState, action: &SpendyAction) -> SpendyState {
        let mut next = state.clone();

        match action {
            SpendyAction::SetCategory { pattern, category } => {
                next.patterns_to_categories
                    .insert(pattern.clone(), normalize_category(category));
                next.categories = categories_of(&next.patterns_to_categories);
            }

            SpendyAction::RenameCategory { category, renamed } => {
                let from = format!("{category}/");
                let to = format!("{}/", normalize_category(renamed));
                let rename = |current: &str| -> String {
                    let suffixed = format!("{current}/");
                    match suffixed.strip_prefix(&from) {
                        Some(rest) => normalize_category(&format!("{to}{rest}")),
                        None => current.to_string(),
                    }
                };

                for assigned in next.patterns_to_categories.values_mut() {
                    *assigned = rename(assigned.as_str());
                }
                next.excluded_categories = next
                    .excluded_categories
                    .iter()
                    .map(|excluded| rename(excluded.as_str()))
                    .collect();
                next.categories = categories_of(&next.patterns_to_categories);
            }

            SpendyAction::ExcludeCategory { category, excluded } => {
                let category = normalize_category(category);
                next.excluded_categories
                    .retain(|existing| !is_within(existing, &category));
                if *excluded {
                    next.excluded_categories.push(category);
                }
            }

            SpendyAction::AddPayments { payments } => {
                next.payments.extend(payments.iter().cloned());
                next.payments.sort();
                next.payments.dedup();
            }

            SpendyAction::ImportAmazonOrders { orders, us } => {
                if *us {
                    next.amazon_us_orders = orders.clone();
                } else {
                    next.amazon_orders = orders.clone();
                }
            }

            SpendyAction::SaveManualMatch { payments, orders } => {
                next.manual_matches.push(ManualMatch {
                    payments: payments.clone(),
                    orders: orders.clone(),
                });
            }
        }

        next
    }
}
