//! Retrieval facade over the object store.
//!
//! Artifacts decode as arrays of objects; the latest-ingestion pointer
//! decodes as a single object. Not-found is passed through from the store
//! unchanged so callers can map it to a 404.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{artifact_key, Record, LATEST_POINTER_KEY, LOGS_PREFIX};
use crate::store::ObjectStore;

/// The pointer document together with the artifact it names.
#[derive(Debug, Clone)]
pub struct LatestArtifact {
    /// The pointer object exactly as stored.
    pub metadata: Record,
    /// Records of the referenced artifact.
    pub records: Vec<Record>,
}

/// Read the artifact stored at `key` (a full key, including `logs/`).
pub async fn read_artifact(store: &dyn ObjectStore, key: &str) -> Result<Vec<Record>> {
    let body = store.get_object(key).await?;
    serde_json::from_slice(&body)
        .map_err(|e| Error::Decode(format!("{} is not an array of objects: {}", key, e)))
}

/// Read the latest-ingestion pointer as a single JSON object.
///
/// A pointer that is not a JSON object is an [`Error::Decode`].
pub async fn read_latest_pointer(store: &dyn ObjectStore) -> Result<Record> {
    let body = store.get_object(LATEST_POINTER_KEY).await?;
    serde_json::from_slice(&body)
        .map_err(|e| Error::Decode(format!("invalid metadata format: {}", e)))
}

/// Extract the artifact name from a pointer object.
///
/// Fails with [`Error::InvalidPointer`] if `filename` is absent, empty or
/// not a string.
pub fn pointer_filename(pointer: &Record) -> Result<&str> {
    match pointer.get("filename") {
        Some(Value::String(name)) if !name.is_empty() => Ok(name),
        _ => Err(Error::InvalidPointer(
            "filename not found in metadata".to_string(),
        )),
    }
}

/// Dereference the pointer and read the artifact it names.
///
/// # Errors
///
/// - [`Error::NotFound`] if the pointer itself does not exist.
/// - [`Error::Decode`] if the pointer is not a JSON object.
/// - [`Error::InvalidPointer`] if the pointer has no usable `filename`.
///   The artifact is not read in either case.
/// - [`Error::DanglingPointer`] if the named artifact is missing or unreadable.
pub async fn read_latest_artifact(store: &dyn ObjectStore) -> Result<LatestArtifact> {
    let metadata = read_latest_pointer(store).await?;
    let filename = pointer_filename(&metadata)?.to_string();

    let records = read_artifact(store, &artifact_key(&filename))
        .await
        .map_err(|e| Error::DanglingPointer {
            filename: filename.clone(),
            reason: e.to_string(),
        })?;

    Ok(LatestArtifact { metadata, records })
}

/// List object names under `prefix` with the prefix stripped.
///
/// Keys equal to the prefix itself (folder markers) are skipped.
pub async fn list_artifact_names(store: &dyn ObjectStore, prefix: &str) -> Result<Vec<String>> {
    let keys = store.list_keys(prefix).await?;
    Ok(keys
        .into_iter()
        .filter_map(|key| {
            let name = key.strip_prefix(prefix).unwrap_or(&key);
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect())
}

/// List everything under `logs/`.
pub async fn list_logs(store: &dyn ObjectStore) -> Result<Vec<String>> {
    list_artifact_names(store, LOGS_PREFIX).await
}

/// Delete `logs/<name>`. No existence check is made first.
pub async fn delete_artifact(store: &dyn ObjectStore, name: &str) -> Result<()> {
    store.delete_object(&artifact_key(name)).await
}
