//! # s3-ingest CLI
//!
//! ```bash
//! s3-ingest serve                  # start the HTTP API (default port 5000)
//! s3-ingest ingest                 # run one ingestion and exit
//! s3-ingest list                   # list stored artifacts
//! s3-ingest get data_<uuid>.json   # print one artifact
//! s3-ingest latest                 # print the most recent ingestion
//! s3-ingest delete data_<uuid>.json
//! ```
//!
//! Settings come from `--config` (TOML, optional) and the environment; see
//! [`s3_ingest::config`].

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use s3_ingest::bootstrap::ensure_bucket;
use s3_ingest::config::{load_config, Config};
use s3_ingest_core::ingest::ingest_and_store;
use s3_ingest_core::models::{artifact_key, is_plain_artifact_name};
use s3_ingest_core::retrieve::{delete_artifact, list_logs, read_artifact, read_latest_artifact};
use s3_ingest::s3::S3Client;
use s3_ingest::server::{run_server, AppState};
use s3_ingest::source::HttpSource;

/// Ingest JSON records from an upstream API into S3 and serve them back.
#[derive(Parser)]
#[command(name = "s3-ingest", version, about)]
struct Cli {
    /// Path to a TOML configuration file. Missing files are ignored;
    /// environment variables override file values.
    #[arg(long, global = true, default_value = "./config/ingest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API. This is the default when no command is given.
    Serve,

    /// Fetch, transform and upload one batch, then exit.
    Ingest,

    /// List object names under `logs/`.
    List,

    /// Print the records of one artifact.
    Get {
        /// Artifact name, e.g. `data_<uuid>.json`.
        filename: String,
    },

    /// Print the latest-ingestion pointer and its artifact.
    Latest,

    /// Delete one artifact.
    Delete {
        /// Artifact name, e.g. `data_<uuid>.json`.
        filename: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let store = Arc::new(S3Client::new(&config.storage)?);
    ensure_bucket(store.as_ref())
        .await
        .with_context(|| format!("Failed to prepare bucket '{}'", config.storage.bucket))?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&config, store).await?,
        Commands::Ingest => {
            let source = HttpSource::new(&config.source)?;
            let result = ingest_and_store(&source, store.as_ref()).await?;
            print_json(&result)?;
        }
        Commands::List => {
            print_json(&list_logs(store.as_ref()).await?)?;
        }
        Commands::Get { filename } => {
            check_name(&filename)?;
            print_json(&read_artifact(store.as_ref(), &artifact_key(&filename)).await?)?;
        }
        Commands::Latest => {
            let latest = read_latest_artifact(store.as_ref()).await?;
            print_json(&serde_json::json!({
                "metadata": latest.metadata,
                "data": latest.records,
            }))?;
        }
        Commands::Delete { filename } => {
            check_name(&filename)?;
            delete_artifact(store.as_ref(), &filename).await?;
            println!("deleted {}", artifact_key(&filename));
        }
    }

    Ok(())
}

async fn serve(config: &Config, store: Arc<S3Client>) -> Result<()> {
    let source = Arc::new(HttpSource::new(&config.source)?);
    run_server(config, AppState::new(store, source)).await
}

fn check_name(filename: &str) -> Result<()> {
    anyhow::ensure!(
        is_plain_artifact_name(filename),
        "'{}' is not an artifact name under logs/",
        filename
    );
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
