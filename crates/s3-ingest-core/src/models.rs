//! Core data models for the ingestion pipeline.
//!
//! Records are untyped JSON objects. Their key order is preserved end to end
//! (`serde_json` is built with `preserve_order`), so an artifact reads back
//! in the same shape it was fetched in.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One ingested unit: an arbitrary JSON object.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Logical folder every artifact and the pointer live under.
pub const LOGS_PREFIX: &str = "logs/";

/// Storage key of the latest-ingestion pointer.
pub const LATEST_POINTER_KEY: &str = "logs/latest_ingestion.json";

/// Value written into every record's `source` field.
pub const SOURCE_TAG: &str = "placeholder_api";

/// Field stamped with the batch ingestion time.
pub const INGESTED_AT_FIELD: &str = "ingested_at";

/// Field stamped with [`SOURCE_TAG`].
pub const SOURCE_FIELD: &str = "source";

const ARTIFACT_NAME_PREFIX: &str = "data_";
const ARTIFACT_NAME_SUFFIX: &str = ".json";

/// Generate a fresh artifact name: `data_<uuid-v4>.json`.
pub fn new_artifact_name() -> String {
    format!(
        "{}{}{}",
        ARTIFACT_NAME_PREFIX,
        Uuid::new_v4(),
        ARTIFACT_NAME_SUFFIX
    )
}

/// Full storage key for an artifact name (`logs/<name>`).
pub fn artifact_key(name: &str) -> String {
    format!("{}{}", LOGS_PREFIX, name)
}

/// Whether `name` addresses a single object directly under `logs/`.
///
/// Names with a `/` or that are `.`/`..` are refused: HTTP clients collapse
/// dot segments after the request has been signed.
pub fn is_plain_artifact_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}

/// Format a timestamp the way every persisted field stores it
/// (RFC 3339, UTC, second precision, `Z` suffix).
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Body of `logs/latest_ingestion.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestPointer {
    pub filename: String,
    pub ingested_at: String,
}

impl LatestPointer {
    pub fn new(filename: impl Into<String>, at: &DateTime<Utc>) -> Self {
        Self {
            filename: filename.into(),
            ingested_at: format_timestamp(at),
        }
    }
}

/// Outcome of one successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestResult {
    /// Artifact name, without the `logs/` prefix.
    pub filename: String,
    /// Number of records stored in the artifact.
    pub count: usize,
}
