//! Service configuration.
//!
//! Settings come from an optional TOML file, then environment variables
//! override individual fields. The storage section must end up complete;
//! anything missing is a startup error.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 5000
//!
//! [storage]
//! region = "eu-west-1"
//! bucket = "ingest-logs"
//! # endpoint_url = "http://localhost:9000"   # MinIO / LocalStack
//!
//! [source]
//! url = "https://jsonplaceholder.typicode.com/posts"
//! timeout_secs = 30
//! ```
//!
//! | Variable | Field |
//! |----------|-------|
//! | `AWS_REGION` | `storage.region` |
//! | `AWS_ACCESS_KEY_ID` | `storage.access_key_id` |
//! | `AWS_SECRET_ACCESS_KEY` | `storage.secret_access_key` |
//! | `AWS_SESSION_TOKEN` | `storage.session_token` |
//! | `S3_BUCKET` | `storage.bucket` |
//! | `S3_ENDPOINT_URL` | `storage.endpoint_url` |
//! | `PORT` | `server.port` |
//! | `SOURCE_URL` | `source.url` |
//! | `SOURCE_TIMEOUT_SECS` | `source.timeout_secs` |

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// `host:port` suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}

#[derive(Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
    /// Custom endpoint (MinIO, LocalStack). Enables path-style addressing.
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_source_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_source_url() -> String {
    "https://jsonplaceholder.typicode.com/posts".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

/// Load configuration from `path` (if it exists) and the process environment.
///
/// Environment variables override values from the file. Blank variables are
/// ignored.
///
/// # Arguments
///
/// - `path`: TOML config file. A missing file is treated as empty.
///
/// # Returns
///
/// The validated [`Config`], or an error naming every required setting
/// that is missing, or the variable that failed to parse.
pub fn load_config(path: &Path) -> Result<Config> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Like [`load_config`], reading variables through `env` instead of the
/// process environment.
pub fn load_config_with<F>(path: &Path, env: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    apply_env(&mut config, env)?;
    validate(&config)?;
    Ok(config)
}

fn apply_env<F>(config: &mut Config, env: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(v) = var("AWS_REGION") {
        config.storage.region = v;
    }
    if let Some(v) = var("AWS_ACCESS_KEY_ID") {
        config.storage.access_key_id = v;
    }
    if let Some(v) = var("AWS_SECRET_ACCESS_KEY") {
        config.storage.secret_access_key = v;
    }
    if let Some(v) = var("AWS_SESSION_TOKEN") {
        config.storage.session_token = Some(v);
    }
    if let Some(v) = var("S3_BUCKET") {
        config.storage.bucket = v;
    }
    if let Some(v) = var("S3_ENDPOINT_URL") {
        config.storage.endpoint_url = Some(v);
    }
    if let Some(v) = var("PORT") {
        config.server.port = v
            .parse()
            .with_context(|| format!("PORT must be a port number, got '{}'", v))?;
    }
    if let Some(v) = var("SOURCE_URL") {
        config.source.url = v;
    }
    if let Some(v) = var("SOURCE_TIMEOUT_SECS") {
        config.source.timeout_secs = v
            .parse()
            .with_context(|| format!("SOURCE_TIMEOUT_SECS must be an integer, got '{}'", v))?;
    }
    Ok(())
}

fn validate(config: &Config) -> Result<()> {
    let required = [
        ("AWS_REGION", &config.storage.region),
        ("AWS_ACCESS_KEY_ID", &config.storage.access_key_id),
        ("AWS_SECRET_ACCESS_KEY", &config.storage.secret_access_key),
        ("S3_BUCKET", &config.storage.bucket),
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        bail!(
            "One or more required settings are missing: {}",
            missing.join(", ")
        );
    }

    if config.source.url.trim().is_empty() {
        bail!("source.url must not be empty");
    }
    if config.source.timeout_secs == 0 {
        bail!("source.timeout_secs must be > 0");
    }
    Ok(())
}
