//! Version tokens and storage payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

const NONE: &str = "none";

/// Opaque revision identifier handed out by a store.
///
/// The sentinel [`Version::none`] means "no remote object is known to
/// exist". Callers never construct other versions themselves; they only echo
/// back tokens a store returned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    /// Wraps a token returned by a store.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The "no known object" sentinel.
    #[must_use]
    pub fn none() -> Self {
        Self(NONE.to_string())
    }

    /// Returns true for the sentinel.
    ///
    /// An empty token is treated the same way; some blob services omit the
    /// ETag for objects that do not exist.
    pub fn is_none(&self) -> bool {
        self.0.is_empty() || self.0 == NONE
    }

    /// Returns the token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Version {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Version {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// An object as exchanged with a store: a version and the sealed bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoragePayload {
    /// Version of the object.
    pub version: Version,
    /// Encrypted object bytes, or `None` when no object exists.
    pub data: Option<Vec<u8>>,
}

impl StoragePayload {
    /// Creates a payload carrying data.
    pub fn new(version: Version, data: Vec<u8>) -> Self {
        Self {
            version,
            data: Some(data),
        }
    }

    /// The payload of an object that does not exist.
    #[must_use]
    pub fn absent() -> Self {
        Self::default()
    }

    /// Returns true if the payload carries no data.
    pub fn is_absent(&self) -> bool {
        self.data.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_version() {
        assert!(Version::none().is_none());
        assert!(Version::new("").is_none());
        assert!(!Version::new("0x8DC").is_none());
        assert_eq!(Version::default(), Version::none());
        assert_eq!(Version::none().to_string(), "none");
    }

    #[test]
    fn absent_payload() {
        let payload = StoragePayload::absent();
        assert!(payload.is_absent());
        assert!(payload.version.is_none());

        let payload = StoragePayload::new("7".into(), vec![1, 2, 3]);
        assert!(!payload.is_absent());
        assert_eq!(payload.version.as_str(), "7");
    }
}
