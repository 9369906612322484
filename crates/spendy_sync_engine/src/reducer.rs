//! The reducer contract.

/// A pure state transition function.
///
/// Reducers must be deterministic and side-effect free: no I/O, no
/// randomness, no wall-clock reads beyond what the action carries. The
/// engine relies on this to replay queued actions onto a freshly loaded
/// base and arrive at the same result the user saw locally.
///
/// Any `Fn(&T, &A) -> T` closure is a reducer:
///
/// ```rust
/// use spendy_sync_engine::Reducer;
///
/// let add = |total: &i64, delta: &i64| total + delta;
/// assert_eq!(add.reduce(&40, &2), 42);
/// ```
pub trait Reducer<T, A>: Send + Sync {
    /// Computes the state that follows `state` once `action` is applied.
    fn reduce(&self, state: &T, action: &A) -> T;
}

impl<T, A, F> Reducer<T, A> for F
where
    F: Fn(&T, &A) -> T + Send + Sync,
{
    fn reduce(&self, state: &T, action: &A) -> T {
        self(state, action)
    }
}
