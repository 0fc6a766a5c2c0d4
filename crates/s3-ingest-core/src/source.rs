//! External record sources.
//!
//! A [`RecordSource`] produces the raw batch for one ingestion. The service
//! uses an HTTP implementation; tests plug in fixed batches.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::Record;

/// A data source that yields one batch of records per call.
///
/// Returns `Ok(None)` when the source answered with JSON `null` instead of
/// an array. The ingestion sequence rejects that batch during transform.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Short human-readable name, used in log output.
    fn name(&self) -> &str;

    /// Fetch and decode one batch.
    async fn fetch(&self) -> Result<Option<Vec<Record>>>;
}

/// Decode a response body as a JSON array of objects.
///
/// `null` decodes to `None`. Anything else that is not an array of objects
/// is an [`Error::Decode`].
pub fn decode_records(body: &[u8]) -> Result<Option<Vec<Record>>> {
    serde_json::from_slice::<Option<Vec<Record>>>(body)
        .map_err(|e| Error::Decode(format!("invalid response format: {}", e)))
}

/// A source that returns the same batch on every call.
pub struct StaticSource {
    records: Option<Vec<Record>>,
}

impl StaticSource {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: Some(records),
        }
    }

    /// A source that behaves like an upstream answering `null`.
    pub fn null() -> Self {
        Self { records: None }
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<Option<Vec<Record>>> {
        Ok(self.records.clone())
    }
}
