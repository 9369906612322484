//! # Spendy Store
//!
//! Versioned remote object stores for the Spendy sync engine.
//!
//! A store holds opaque byte objects addressed by name. Every object carries
//! an opaque version token (an ETag). Writes are **conditional**: a save
//! succeeds only if the caller's version matches the store's current one,
//! which makes the store the single cross-client exclusion primitive.
//!
//! ## Semantics
//!
//! - `load` of a missing object returns `{ version: none, data: None }`
//! - `save` with a non-none version fails with [`StoreError::Conflict`] when
//!   the object has moved on
//! - `save` with the none version fails with [`StoreError::AlreadyExists`]
//!   when some other writer created the object first
//! - a `save` without data is a no-op returning the supplied version
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - in-process, for tests and demos
//! - [`DirectoryStore`] - one file per object on the local file system
//! - [`HttpStore`] - a blob service speaking `GET /read` / `PUT /write`

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod directory;
mod error;
mod http;
mod memory;
mod payload;
mod store;

pub use directory::DirectoryStore;
pub use error::{StoreError, StoreResult};
pub use http::{HttpClient, HttpResponse, HttpStore, HttpStoreConfig, Precondition};
pub use memory::MemoryStore;
pub use payload::{StoragePayload, Version};
pub use store::{validate_object_name, RemoteStore};
