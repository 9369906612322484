//! HTTP blob-service store.
//!
//! This module maps the [`RemoteStore`] contract onto a minimal blob
//! service:
//!
//! - `GET  {base}/read/{key}`  returns the object, its version in `ETag`
//! - `PUT  {base}/write/{key}` stores the body; `If-Match` makes the write
//!   conditional, `If-None-Match: *` makes it a create
//! - `412 Precondition Failed` reports a lost race
//!
//! The actual HTTP client is abstracted via a trait so any library (or an
//! in-process fake) can be plugged in.

use crate::error::{StoreError, StoreResult};
use crate::payload::{StoragePayload, Version};
use crate::store::{validate_object_name, RemoteStore};
use std::future::Future;

/// Precondition attached to a `PUT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// `If-Match: <etag>`: only overwrite this exact revision.
    IfMatch(String),
    /// `If-None-Match: *`: only create.
    IfNoneMatch,
}

/// A response as seen by the store.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Value of the `ETag` header, if any.
    pub etag: Option<String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Errors are transport-level failures (DNS, connection, timeout); HTTP
/// error statuses are returned as normal responses.
pub trait HttpClient: Send + Sync + 'static {
    /// Sends a GET request.
    fn get(&self, url: &str) -> impl Future<Output = Result<HttpResponse, String>> + Send;

    /// Sends a PUT request with the given precondition.
    fn put(
        &self,
        url: &str,
        body: Vec<u8>,
        precondition: Precondition,
    ) -> impl Future<Output = Result<HttpResponse, String>> + Send;
}

/// Configuration for [`HttpStore`].
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Base URL of the blob service (e.g. `https://blobs.example.com`).
    pub base_url: String,
    /// Optional owner prefix; objects are stored as `{owner}-{name}`.
    pub owner: Option<String>,
}

impl HttpStoreConfig {
    /// Creates a configuration for the given service.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            owner: None,
        }
    }

    /// Sets the owner prefix.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// A [`RemoteStore`] backed by an HTTP blob service.
pub struct HttpStore<C: HttpClient> {
    config: HttpStoreConfig,
    client: C,
}

impl<C: HttpClient> HttpStore<C> {
    /// Creates a new HTTP store.
    pub fn new(config: HttpStoreConfig, client: C) -> Self {
        Self { config, client }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &HttpStoreConfig {
        &self.config
    }

    fn object_key(&self, name: &str) -> StoreResult<String> {
        let key = match &self.config.owner {
            Some(owner) => format!("{owner}-{name}"),
            None => name.to_string(),
        };
        validate_object_name(&key)?;
        Ok(key)
    }

    fn url(&self, action: &str, key: &str) -> String {
        format!(
            "{}/{action}/{key}",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

fn status_error(status: u16) -> StoreError {
    if status >= 500 || status == 408 || status == 429 {
        StoreError::transport_retryable(format!("server responded with status {status}"))
    } else {
        StoreError::transport_fatal(format!("server responded with status {status}"))
    }
}

impl<C: HttpClient> RemoteStore for HttpStore<C> {
    async fn load(&self, name: &str) -> StoreResult<StoragePayload> {
        let key = self.object_key(name)?;
        let response = self
            .client
            .get(&self.url("read", &key))
            .await
            .map_err(StoreError::transport_retryable)?;

        if response.status == 404 {
            return Ok(StoragePayload::absent());
        }
        if !response.is_success() {
            return Err(status_error(response.status));
        }

        let etag = response
            .etag
            .ok_or_else(|| StoreError::Protocol("read response carries no ETag".into()))?;
        Ok(StoragePayload::new(Version::new(etag), response.body))
    }

    async fn save(&self, name: &str, payload: StoragePayload) -> StoreResult<Version> {
        let key = self.object_key(name)?;
        let Some(data) = payload.data else {
            return Ok(payload.version);
        };

        let precondition = if payload.version.is_none() {
            Precondition::IfNoneMatch
        } else {
            Precondition::IfMatch(payload.version.as_str().to_string())
        };

        let response = self
            .client
            .put(&self.url("write", &key), data, precondition.clone())
            .await
            .map_err(StoreError::transport_retryable)?;

        if response.status == 412 {
            tracing::debug!(object = %key, "write precondition failed");
            return Err(match precondition {
                Precondition::IfNoneMatch => StoreError::AlreadyExists { name: key },
                Precondition::IfMatch(_) => StoreError::Conflict {
                    expected: payload.version,
                    actual: response.etag.map(Version::new),
                },
            });
        }
        if !response.is_success() {
            return Err(status_error(response.status));
        }

        response
            .etag
            .map(Version::new)
            .ok_or_else(|| StoreError::Protocol("write response carries no ETag".into()))
    }
}
