//! The remote store capability consumed by the sync engine.

use crate::error::{StoreError, StoreResult};
use crate::payload::{StoragePayload, Version};
use std::future::Future;
use std::sync::Arc;

/// A versioned object store with conditional writes.
///
/// # Invariants
///
/// - `load` of a missing object is not an error: it yields
///   [`StoragePayload::absent`] (version none, no data)
/// - `save` fails with [`StoreError::Conflict`] iff a non-none version was
///   supplied and differs from the store's current version
/// - `save` fails with [`StoreError::AlreadyExists`] iff the none version was
///   supplied and the object exists
/// - otherwise `save` succeeds and returns a fresh version
/// - `save` of a payload without data writes nothing and returns the
///   supplied version
///
/// Timeouts are the implementation's concern; any other failure is reported
/// as a transport or I/O error.
pub trait RemoteStore: Send + Sync + 'static {
    /// Loads the current revision of `name`.
    fn load(&self, name: &str) -> impl Future<Output = StoreResult<StoragePayload>> + Send;

    /// Conditionally writes `payload.data` to `name`.
    fn save(
        &self,
        name: &str,
        payload: StoragePayload,
    ) -> impl Future<Output = StoreResult<Version>> + Send;
}

impl<S: RemoteStore> RemoteStore for Arc<S> {
    fn load(&self, name: &str) -> impl Future<Output = StoreResult<StoragePayload>> + Send {
        (**self).load(name)
    }

    fn save(
        &self,
        name: &str,
        payload: StoragePayload,
    ) -> impl Future<Output = StoreResult<Version>> + Send {
        (**self).save(name, payload)
    }
}

/// Checks that `name` is usable as an object key on every store.
///
/// Names are non-empty, at most 128 bytes, made of ASCII letters, digits,
/// `-`, `_` and `.`, and do not start with a dot.
pub fn validate_object_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name.len() <= 128
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidObjectName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_names() {
        assert!(validate_object_name("spendy").is_ok());
        assert!(validate_object_name("alice-spendy.v2").is_ok());

        assert!(validate_object_name("").is_err());
        assert!(validate_object_name(".hidden").is_err());
        assert!(validate_object_name("../escape").is_err());
        assert!(validate_object_name("with space").is_err());
        assert!(validate_object_name(&"x".repeat(129)).is_err());
    }
}
