//! Object storage abstraction.
//!
//! The [`ObjectStore`] trait is the only path from the ingestion sequence
//! and retrieval facade to persisted data. The service backs it with the S3
//! REST client; tests use [`memory::InMemoryObjectStore`].
//!
//! Implementations must be `Send + Sync` to work with async runtimes, and
//! must report a missing object as [`Error::NotFound`](crate::Error::NotFound)
//! so that callers never inspect backend-specific error codes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;

/// Flat key/value object storage scoped to a single bucket.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`put_object`](ObjectStore::put_object) | Create or overwrite an object |
/// | [`get_object`](ObjectStore::get_object) | Read an object's bytes |
/// | [`list_keys`](ObjectStore::list_keys) | All keys under a prefix |
/// | [`delete_object`](ObjectStore::delete_object) | Remove an object |
/// | [`bucket_exists`](ObjectStore::bucket_exists) | Check the bucket |
/// | [`create_bucket`](ObjectStore::create_bucket) | Create the bucket |
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key`, replacing any existing object.
    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;

    /// Read the object at `key`.
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if no such object exists.
    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;

    /// List every key that starts with `prefix`, in lexicographic order.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete the object at `key`.
    ///
    /// Whether deleting a missing key fails is up to the backend.
    async fn delete_object(&self, key: &str) -> Result<()>;

    /// Whether the configured bucket exists and is reachable.
    async fn bucket_exists(&self) -> Result<bool>;

    /// Create the configured bucket. Succeeds if it already exists.
    async fn create_bucket(&self) -> Result<()>;
}
