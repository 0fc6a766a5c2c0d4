//! In-memory [`ObjectStore`] for tests and local runs.
//!
//! Objects live in a `BTreeMap` behind `std::sync::RwLock`, so listings come
//! back in key order like S3's. Puts, gets and deletes under chosen key
//! prefixes, and listings, can be made to fail to exercise error paths.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::ObjectStore;

/// In-memory object store.
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    failing_puts: RwLock<HashSet<String>>,
    failing_gets: RwLock<HashSet<String>>,
    failing_deletes: RwLock<HashSet<String>>,
    failing_lists: AtomicBool,
    bucket: AtomicBool,
    create_calls: AtomicUsize,
}

impl InMemoryObjectStore {
    /// A store whose bucket already exists.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            failing_puts: RwLock::new(HashSet::new()),
            failing_gets: RwLock::new(HashSet::new()),
            failing_deletes: RwLock::new(HashSet::new()),
            failing_lists: AtomicBool::new(false),
            bucket: AtomicBool::new(true),
            create_calls: AtomicUsize::new(0),
        }
    }

    /// A store whose bucket has not been created yet.
    pub fn without_bucket() -> Self {
        let store = Self::new();
        store.bucket.store(false, Ordering::SeqCst);
        store
    }

    /// Make every subsequent `put_object` to a key starting with `prefix`
    /// fail with a transport error.
    pub fn fail_puts_matching(&self, prefix: &str) {
        self.failing_puts.write().unwrap().insert(prefix.to_string());
    }

    /// Make every subsequent `get_object` of a key starting with `prefix`
    /// fail with a transport error.
    pub fn fail_gets_matching(&self, prefix: &str) {
        self.failing_gets.write().unwrap().insert(prefix.to_string());
    }

    /// Make every subsequent `delete_object` of a key starting with `prefix`
    /// fail with a transport error.
    pub fn fail_deletes_matching(&self, prefix: &str) {
        self.failing_deletes.write().unwrap().insert(prefix.to_string());
    }

    /// Make every subsequent `list_keys` fail with a transport error.
    pub fn fail_lists(&self) {
        self.failing_lists.store(true, Ordering::SeqCst);
    }

    /// Number of times [`ObjectStore::create_bucket`] has been called.
    pub fn create_bucket_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Whether an object is stored at `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().unwrap().contains_key(key)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_object(&self, key: &str, body: Vec<u8>, _content_type: &str) -> Result<()> {
        if matches_prefix(&self.failing_puts, key) {
            return Err(Error::Transport(format!("injected put failure for {}", key)));
        }
        self.objects.write().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        if matches_prefix(&self.failing_gets, key) {
            return Err(Error::Transport(format!("injected get failure for {}", key)));
        }
        self.objects
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                key: key.to_string(),
            })
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        if self.failing_lists.load(Ordering::SeqCst) {
            return Err(Error::Transport(format!("injected list failure for {}", prefix)));
        }
        Ok(self
            .objects
            .read()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        if matches_prefix(&self.failing_deletes, key) {
            return Err(Error::Transport(format!("injected delete failure for {}", key)));
        }
        // S3 semantics: deleting a missing key succeeds.
        self.objects.write().unwrap().remove(key);
        Ok(())
    }

    async fn bucket_exists(&self) -> Result<bool> {
        Ok(self.bucket.load(Ordering::SeqCst))
    }

    async fn create_bucket(&self) -> Result<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.bucket.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn matches_prefix(prefixes: &RwLock<HashSet<String>>, key: &str) -> bool {
    prefixes
        .read()
        .unwrap()
        .iter()
        .any(|prefix| key.starts_with(prefix.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let store = InMemoryObjectStore::new();
        store.put_object("logs/a", b"1".to_vec(), "application/json").await.unwrap();
        store.put_object("logs/a", b"2".to_vec(), "application/json").await.unwrap();
        assert_eq!(store.get_object("logs/a").await.unwrap(), b"2");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let store = InMemoryObjectStore::new();
        let err = store.get_object("logs/nope").await.unwrap_err();
        assert_eq!(
            err,
            Error::NotFound {
                key: "logs/nope".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_list_by_prefix_sorted() {
        let store = InMemoryObjectStore::new();
        for key in ["logs/b", "other/x", "logs/a"] {
            store.put_object(key, Vec::new(), "text/plain").await.unwrap();
        }
        assert_eq!(store.list_keys("logs/").await.unwrap(), vec!["logs/a", "logs/b"]);
    }

    #[tokio::test]
    async fn test_injected_put_failure() {
        let store = InMemoryObjectStore::new();
        store.fail_puts_matching("logs/x");
        let err = store.put_object("logs/x", Vec::new(), "text/plain").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(!store.contains("logs/x"));
    }

    #[tokio::test]
    async fn test_injected_read_list_delete_failures() {
        let store = InMemoryObjectStore::new();
        store.put_object("logs/a", b"1".to_vec(), "text/plain").await.unwrap();
        store.put_object("other/b", b"2".to_vec(), "text/plain").await.unwrap();
        store.fail_gets_matching("logs/");
        store.fail_deletes_matching("logs/");

        assert!(matches!(store.get_object("logs/a").await, Err(Error::Transport(_))));
        assert!(matches!(store.get_object("logs/missing").await, Err(Error::Transport(_))));
        assert_eq!(store.get_object("other/b").await.unwrap(), b"2");

        assert!(matches!(store.delete_object("logs/a").await, Err(Error::Transport(_))));
        assert!(store.contains("logs/a"));
        store.delete_object("other/b").await.unwrap();

        store.fail_lists();
        assert!(matches!(store.list_keys("logs/").await, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn test_create_bucket() {
        let store = InMemoryObjectStore::without_bucket();
        assert!(!store.bucket_exists().await.unwrap());
        store.create_bucket().await.unwrap();
        assert!(store.bucket_exists().await.unwrap());
        assert_eq!(store.create_bucket_calls(), 1);
    }
}
