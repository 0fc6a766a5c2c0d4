//! Record transform: stamp every record with ingestion metadata.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{format_timestamp, Record, INGESTED_AT_FIELD, SOURCE_FIELD, SOURCE_TAG};

/// Add or overwrite `ingested_at` and `source` on every record.
///
/// `ingested_at` is the same value for the whole batch. All other fields,
/// the element count and the element order are left untouched.
///
/// `records` is `None` when the upstream body was JSON `null`; that is
/// rejected with [`Error::Validation`].
pub fn transform_records(
    records: Option<Vec<Record>>,
    now: &DateTime<Utc>,
) -> Result<Vec<Record>> {
    let mut records =
        records.ok_or_else(|| Error::Validation("input data is nil".to_string()))?;

    let stamp = format_timestamp(now);
    for record in &mut records {
        record.insert(INGESTED_AT_FIELD.to_string(), Value::String(stamp.clone()));
        record.insert(SOURCE_FIELD.to_string(), Value::String(SOURCE_TAG.to_string()));
    }
    Ok(records)
}
