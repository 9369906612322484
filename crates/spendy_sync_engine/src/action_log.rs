//! Log of locally applied actions awaiting confirmation.

use crate::reducer::Reducer;
use std::collections::VecDeque;

/// Ordered record of actions applied locally but not yet confirmed durable.
///
/// # Invariants
///
/// - Append order is dispatch order; entries are never reordered or
///   deduplicated
/// - The engine's state always equals `replay_onto(base)` where `base` is
///   the last state obtained from a load, a reconciliation or a save
#[derive(Debug, Clone)]
pub struct ActionLog<A> {
    entries: VecDeque<A>,
}

impl<A> ActionLog<A> {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Records an action.
    pub fn append(&mut self, action: A) {
        self.entries.push_back(action);
    }

    /// Removes and returns every recorded action, in order.
    pub fn drain(&mut self) -> Vec<A> {
        self.entries.drain(..).collect()
    }

    /// Applies every recorded action, in order, on top of `base`.
    ///
    /// The log is left untouched.
    pub fn replay_onto<T, R>(&self, base: T, reducer: &R) -> T
    where
        R: Reducer<T, A> + ?Sized,
    {
        self.entries
            .iter()
            .fold(base, |state, action| reducer.reduce(&state, action))
    }

    /// Drops the first `count` actions, the prefix a save has made durable.
    ///
    /// Returns the number of actions removed.
    pub fn acknowledge(&mut self, count: usize) -> usize {
        let count = count.min(self.entries.len());
        self.entries.drain(..count);
        count
    }

    /// Number of queued actions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over queued actions in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &A> {
        self.entries.iter()
    }
}

impl<A> Default for ActionLog<A> {
    fn default() -> Self {
        Self::new()
    }
}
