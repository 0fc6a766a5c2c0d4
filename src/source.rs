//! HTTP upstream source.
//!
//! Fetches one batch of records with a plain `GET` against the configured
//! URL. Any transport failure or non-success status aborts the ingestion
//! before anything is written.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use s3_ingest_core::models::Record;
use s3_ingest_core::source::{decode_records, RecordSource};
use s3_ingest_core::{Error, Result};

use crate::config::SourceConfig;

/// [`RecordSource`] backed by a remote JSON API.
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(config: &SourceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl RecordSource for HttpSource {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Option<Vec<Record>>> {
        debug!(url = %self.url, "fetching upstream records");
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!("status code {}", status)));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::Upstream(format!("failed to read response body: {}", e)))?;
        decode_records(&body)
    }
}
