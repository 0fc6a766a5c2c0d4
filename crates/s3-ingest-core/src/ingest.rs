//! The ingestion sequence: fetch → transform → upload → publish pointer.
//!
//! The artifact upload and the pointer publish are two separate phases. The
//! artifact is the primary result; a failed pointer write is logged and
//! otherwise ignored, so the pointer may lag behind the newest artifact.
//!
//! Concurrent ingestions are not coordinated. Each writes its own artifact,
//! and the pointer ends up naming whichever one published last.

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::{
    artifact_key, new_artifact_name, IngestResult, LatestPointer, Record, LATEST_POINTER_KEY,
};
use crate::source::RecordSource;
use crate::store::ObjectStore;
use crate::transform::transform_records;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Run one ingestion against `source`, storing the artifact in `store`.
///
/// # Errors
///
/// - [`Error::Upstream`] / [`Error::Decode`] if the fetch fails; nothing is written.
/// - [`Error::Validation`] if the source returned no sequence.
/// - Whatever the store reports if the artifact upload fails; the pointer
///   is left untouched.
///
/// A pointer publish failure is never returned.
pub async fn ingest_and_store(
    source: &dyn RecordSource,
    store: &dyn ObjectStore,
) -> Result<IngestResult> {
    let fetched = source.fetch().await?;

    let records = transform_records(fetched, &Utc::now()).map_err(|e| match e {
        Error::Validation(reason) => {
            Error::Validation(format!("error during response transformation: {}", reason))
        }
        other => other,
    })?;

    let filename = new_artifact_name();
    upload_artifact(store, &filename, &records).await?;
    info!(
        source = source.name(),
        filename = %filename,
        count = records.len(),
        "artifact uploaded"
    );

    if let Err(e) = publish_latest_pointer(store, &filename).await {
        warn!(filename = %filename, error = %e, "failed to write latest_ingestion.json");
    }

    Ok(IngestResult {
        filename,
        count: records.len(),
    })
}

/// Serialize `records` as pretty-printed JSON and store them at `logs/<filename>`.
pub async fn upload_artifact(
    store: &dyn ObjectStore,
    filename: &str,
    records: &[Record],
) -> Result<()> {
    let body = serde_json::to_vec_pretty(records)
        .map_err(|e| Error::Decode(format!("failed to encode artifact: {}", e)))?;
    store
        .put_object(&artifact_key(filename), body, JSON_CONTENT_TYPE)
        .await
}

/// Overwrite `logs/latest_ingestion.json` to point at `filename`,
/// stamped with the current time.
pub async fn publish_latest_pointer(store: &dyn ObjectStore, filename: &str) -> Result<()> {
    let pointer = LatestPointer::new(filename, &Utc::now());
    let body = serde_json::to_vec(&pointer)
        .map_err(|e| Error::Decode(format!("failed to encode pointer: {}", e)))?;
    store
        .put_object(LATEST_POINTER_KEY, body, JSON_CONTENT_TYPE)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieve::{read_artifact, read_latest_pointer};
    use crate::source::StaticSource;
    use crate::store::memory::InMemoryObjectStore;
    use async_trait::async_trait;
    use serde_json::json;

    fn one_record() -> StaticSource {
        StaticSource::new(vec![json!({"id": 1, "title": "a"})
            .as_object()
            .unwrap()
            .clone()])
    }

    struct FailingSource;

    #[async_trait]
    impl RecordSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch(&self) -> Result<Option<Vec<Record>>> {
            Err(Error::Upstream("status code 503".to_string()))
        }
    }

    #[tokio::test]
    async fn test_ingest_stores_artifact_and_pointer() {
        let store = InMemoryObjectStore::new();
        let result = ingest_and_store(&one_record(), &store).await.unwrap();

        assert_eq!(result.count, 1);
        assert!(result.filename.starts_with("data_"));

        let records = read_artifact(&store, &artifact_key(&result.filename))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["id"], 1);
        assert_eq!(records[0]["title"], "a");
        assert_eq!(records[0]["source"], "placeholder_api");
        assert!(!records[0]["ingested_at"].as_str().unwrap().is_empty());

        let pointer = read_latest_pointer(&store).await.unwrap();
        assert_eq!(pointer["filename"], result.filename.as_str());
        assert!(pointer["ingested_at"].is_string());
    }

    #[tokio::test]
    async fn test_artifact_is_pretty_printed() {
        let store = InMemoryObjectStore::new();
        let result = ingest_and_store(&one_record(), &store).await.unwrap();
        let raw = store
            .get_object(&artifact_key(&result.filename))
            .await
            .unwrap();
        let text = String::from_utf8(raw).unwrap();
        assert!(text.starts_with("[\n  {"));
    }

    #[tokio::test]
    async fn test_upstream_failure_writes_nothing() {
        let store = InMemoryObjectStore::new();
        let err = ingest_and_store(&FailingSource, &store).await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_null_batch_fails_transform() {
        let store = InMemoryObjectStore::new();
        let err = ingest_and_store(&StaticSource::null(), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_null_batch_message_names_cause_once() {
        let store = InMemoryObjectStore::new();
        let err = ingest_and_store(&StaticSource::null(), &store)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation error: error during response transformation: input data is nil"
        );
    }

    #[tokio::test]
    async fn test_upload_failure_leaves_pointer_untouched() {
        let store = InMemoryObjectStore::new();
        let first = ingest_and_store(&one_record(), &store).await.unwrap();
        store.fail_puts_matching("logs/data_");

        let err = ingest_and_store(&one_record(), &store).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        let pointer = read_latest_pointer(&store).await.unwrap();
        assert_eq!(pointer["filename"], first.filename.as_str());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_pointer_failure_does_not_fail_ingest() {
        let store = InMemoryObjectStore::new();
        store.fail_puts_matching(LATEST_POINTER_KEY);

        let result = ingest_and_store(&one_record(), &store).await.unwrap();
        assert!(store.contains(&artifact_key(&result.filename)));
        assert!(!store.contains(LATEST_POINTER_KEY));
    }

    #[tokio::test]
    async fn test_pointer_failure_leaves_previous_pointer() {
        let store = InMemoryObjectStore::new();
        let first = ingest_and_store(&one_record(), &store).await.unwrap();
        store.fail_puts_matching(LATEST_POINTER_KEY);
        let second = ingest_and_store(&one_record(), &store).await.unwrap();

        let pointer = read_latest_pointer(&store).await.unwrap();
        assert_eq!(pointer["filename"], first.filename.as_str());
        assert_ne!(first.filename, second.filename);
    }

    #[tokio::test]
    async fn test_each_ingest_writes_a_new_artifact() {
        let store = InMemoryObjectStore::new();
        let a = ingest_and_store(&one_record(), &store).await.unwrap();
        let b = ingest_and_store(&one_record(), &store).await.unwrap();
        assert_ne!(a.filename, b.filename);
        // two artifacts plus the pointer
        assert_eq!(store.len(), 3);
        let pointer = read_latest_pointer(&store).await.unwrap();
        assert_eq!(pointer["filename"], b.filename.as_str());
    }
}
