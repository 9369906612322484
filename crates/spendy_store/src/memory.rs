//! In-memory store for tests and demos.

use crate::error::{StoreError, StoreResult};
use crate::payload::{StoragePayload, Version};
use crate::store::{validate_object_name, RemoteStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// An in-process versioned object store.
///
/// Versions are decimal counters (`"1"`, `"2"`, ...) shared across all
/// objects, so every successful write yields a version never seen before.
///
/// Besides the [`RemoteStore`] contract it exposes hooks that tests use to
/// play the part of a competing writer or a flaky network:
///
/// ```rust
/// use spendy_store::{MemoryStore, Version};
///
/// let store = MemoryStore::new();
/// let v1 = store.write_external("spendy", b"sealed".to_vec());
/// assert_eq!(store.object("spendy").unwrap().version, v1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    latency: Option<Duration>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: HashMap<String, StoredObject>,
    last_version: u64,
    failing_loads: u32,
    failing_saves: u32,
    load_count: u64,
    save_attempts: Vec<Version>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    version: Version,
    data: Vec<u8>,
}

impl Inner {
    fn next_version(&mut self) -> Version {
        self.last_version += 1;
        Version::new(self.last_version.to_string())
    }
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose operations take `latency` to complete.
    ///
    /// The delay uses `tokio::time`, so paused-clock tests stay deterministic.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            latency: Some(latency),
        }
    }

    /// Writes `data` unconditionally, as another client would.
    ///
    /// Returns the new version.
    pub fn write_external(&self, name: &str, data: Vec<u8>) -> Version {
        let mut inner = self.inner.lock();
        let version = inner.next_version();
        inner.objects.insert(
            name.to_string(),
            StoredObject {
                version: version.clone(),
                data,
            },
        );
        version
    }

    /// Returns the stored object, bypassing counters and failure injection.
    pub fn object(&self, name: &str) -> Option<StoragePayload> {
        self.inner
            .lock()
            .objects
            .get(name)
            .map(|obj| StoragePayload::new(obj.version.clone(), obj.data.clone()))
    }

    /// Makes the next `count` loads fail with a retryable transport error.
    pub fn fail_next_loads(&self, count: u32) {
        self.inner.lock().failing_loads = count;
    }

    /// Makes the next `count` saves fail with a retryable transport error.
    pub fn fail_next_saves(&self, count: u32) {
        self.inner.lock().failing_saves = count;
    }

    /// Number of `load` calls served (including injected failures).
    pub fn load_count(&self) -> u64 {
        self.inner.lock().load_count
    }

    /// The version supplied by every `save` call that carried data, in order.
    pub fn save_attempts(&self) -> Vec<Version> {
        self.inner.lock().save_attempts.clone()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn load_now(&self, name: &str) -> StoreResult<StoragePayload> {
        let mut inner = self.inner.lock();
        inner.load_count += 1;

        if inner.failing_loads > 0 {
            inner.failing_loads -= 1;
            return Err(StoreError::transport_retryable("injected load failure"));
        }

        Ok(inner
            .objects
            .get(name)
            .map(|obj| StoragePayload::new(obj.version.clone(), obj.data.clone()))
            .unwrap_or_else(StoragePayload::absent))
    }

    fn save_now(&self, name: &str, version: Version, data: Vec<u8>) -> StoreResult<Version> {
        let mut inner = self.inner.lock();
        inner.save_attempts.push(version.clone());

        if inner.failing_saves > 0 {
            inner.failing_saves -= 1;
            return Err(StoreError::transport_retryable("injected save failure"));
        }

        match inner.objects.get(name) {
            Some(current) if version.is_none() => {
                tracing::debug!(object = name, current = %current.version, "create raced");
                return Err(StoreError::AlreadyExists {
                    name: name.to_string(),
                });
            }
            Some(current) if current.version != version => {
                return Err(StoreError::Conflict {
                    expected: version,
                    actual: Some(current.version.clone()),
                });
            }
            None if !version.is_none() => {
                return Err(StoreError::Conflict {
                    expected: version,
                    actual: None,
                });
            }
            _ => {}
        }

        let new_version = inner.next_version();
        inner.objects.insert(
            name.to_string(),
            StoredObject {
                version: new_version.clone(),
                data,
            },
        );
        Ok(new_version)
    }
}

impl RemoteStore for MemoryStore {
    async fn load(&self, name: &str) -> StoreResult<StoragePayload> {
        validate_object_name(name)?;
        self.simulate_latency().await;
        self.load_now(name)
    }

    async fn save(&self, name: &str, payload: StoragePayload) -> StoreResult<Version> {
        validate_object_name(name)?;
        let Some(data) = payload.data else {
            return Ok(payload.version);
        };

        self.simulate_latency().await;
        self.save_now(name, payload.version, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_object_loads_as_absent() {
        let store = MemoryStore::new();
        let loaded = store.load("spendy").await.unwrap();
        assert!(loaded.is_absent());
        assert!(loaded.version.is_none());
        assert_eq!(store.load_count(), 1);
    }

    #[tokio::test]
    async fn create_then_conditional_update() {
        let store = MemoryStore::new();

        let v1 = store
            .save("spendy", StoragePayload::new(Version::none(), vec![1]))
            .await
            .unwrap();
        let v2 = store
            .save("spendy", StoragePayload::new(v1.clone(), vec![2]))
            .await
            .unwrap();
        assert_ne!(v1, v2);

        let loaded = store.load("spendy").await.unwrap();
        assert_eq!(loaded.version, v2);
        assert_eq!(loaded.data.unwrap(), vec![2]);
        assert_eq!(store.save_attempts(), vec![Version::none(), v1]);
    }

    #[tokio::test]
    async fn stale_version_conflicts() {
        let store = MemoryStore::new();
        let v1 = store.write_external("spendy", vec![1]);
        let v2 = store.write_external("spendy", vec![2]);

        let err = store
            .save("spendy", StoragePayload::new(v1.clone(), vec![3]))
            .await
            .unwrap_err();
        match err {
            StoreError::Conflict { expected, actual } => {
                assert_eq!(expected, v1);
                assert_eq!(actual, Some(v2));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_over_existing_object_fails() {
        let store = MemoryStore::new();
        store.write_external("spendy", vec![1]);

        let err = store
            .save("spendy", StoragePayload::new(Version::none(), vec![2]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn save_without_data_is_a_noop() {
        let store = MemoryStore::new();
        let version = store
            .save(
                "spendy",
                StoragePayload {
                    version: Version::new("42"),
                    data: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(version, Version::new("42"));
        assert!(store.object("spendy").is_none());
        assert!(store.save_attempts().is_empty());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = MemoryStore::new();
        store.fail_next_loads(1);
        store.fail_next_saves(1);

        assert!(store.load("spendy").await.unwrap_err().is_retryable());
        assert!(store.load("spendy").await.is_ok());

        let payload = StoragePayload::new(Version::none(), vec![1]);
        assert!(store.save("spendy", payload.clone()).await.is_err());
        assert!(store.save("spendy", payload).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn latency_uses_tokio_time() {
        let store = MemoryStore::with_latency(Duration::from_millis(500));
        let start = tokio::time::Instant::now();
        store.load("spendy").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn rejects_bad_names() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.load("../etc").await,
            Err(StoreError::InvalidObjectName(_))
        ));
    }
}
