//! # Spendy Ledger
//!
//! The application state synchronized by Spendy: imported bank payments,
//! Amazon orders, and the user's categorization of them.
//!
//! State changes only through [`SpendyAction`]s applied by the pure
//! [`SpendyReducer`], which is what lets the sync engine replay local edits
//! on top of a newer remote copy.
//!
//! ```rust
//! use spendy_ledger::{SpendyAction, SpendyReducer, SpendyState};
//! use spendy_sync_engine::Reducer;
//!
//! let state = SpendyReducer.reduce(
//!     &SpendyState::default(),
//!     &SpendyAction::SetCategory {
//!         pattern: "tesco".into(),
//!         category: "Groceries ".into(),
//!     },
//! );
//! assert_eq!(state.category_of("tesco"), Some("groceries"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod ledger;
mod reducer;
mod state;

pub use action::SpendyAction;
pub use ledger::{open_ledger, open_ledger_with, LedgerEngine, OBJECT_NAME};
pub use reducer::{normalize_category, SpendyReducer};
pub use state::{AmazonOrder, ManualMatch, Payment, SpendyState};
