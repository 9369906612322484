//! Directory-backed store.

use crate::error::{StoreError, StoreResult};
use crate::payload::{StoragePayload, Version};
use crate::store::{validate_object_name, RemoteStore};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const OBJECT_EXTENSION: &str = "blob";

/// A store keeping one file per object under a root directory.
///
/// The version of an object is the hex SHA-256 of its bytes, which behaves
/// like an HTTP ETag: any change to the content changes the version.
/// Writes go to a temporary file that is renamed over the object, so readers
/// never observe a torn object.
///
/// Conditional writes are serialized within one process. Two processes
/// writing the same directory can still race between the version check and
/// the rename.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl DirectoryStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{OBJECT_EXTENSION}"))
    }

    fn version_of(data: &[u8]) -> Version {
        let digest = Sha256::digest(data);
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        Version::new(hex)
    }

    async fn read_object(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.object_path(name)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl RemoteStore for DirectoryStore {
    async fn load(&self, name: &str) -> StoreResult<StoragePayload> {
        validate_object_name(name)?;

        Ok(match self.read_object(name).await? {
            Some(data) => StoragePayload::new(Self::version_of(&data), data),
            None => StoragePayload::absent(),
        })
    }

    async fn save(&self, name: &str, payload: StoragePayload) -> StoreResult<Version> {
        validate_object_name(name)?;
        let Some(data) = payload.data else {
            return Ok(payload.version);
        };

        let _guard = self.write_lock.lock().await;

        let current = self
            .read_object(name)
            .await?
            .map(|existing| Self::version_of(&existing));

        match current {
            Some(_) if payload.version.is_none() => {
                return Err(StoreError::AlreadyExists {
                    name: name.to_string(),
                });
            }
            Some(current) if current != payload.version => {
                return Err(StoreError::Conflict {
                    expected: payload.version,
                    actual: Some(current),
                });
            }
            None if !payload.version.is_none() => {
                return Err(StoreError::Conflict {
                    expected: payload.version,
                    actual: None,
                });
            }
            _ => {}
        }

        let path = self.object_path(name);
        let tmp = path.with_extension(format!("{OBJECT_EXTENSION}.tmp"));
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &path).await?;

        let version = Self::version_of(&data);
        tracing::debug!(object = name, version = %version, bytes = data.len(), "object written");
        Ok(version)
    }
}
