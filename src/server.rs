//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Liveness check |
//! | `POST`   | `/ingest` | Run one ingestion |
//! | `GET`    | `/getdata?filename=` | Read one artifact |
//! | `GET`    | `/listfiles` | List names under `logs/` |
//! | `GET`    | `/latest` | Read the pointer and the artifact it names |
//! | `DELETE` | `/delete?filename=` | Delete one artifact |
//!
//! # Error Contract
//!
//! Every error response has the same shape, with the HTTP status carrying
//! the condition (400, 404, 405 or 500):
//!
//! ```json
//! { "status": "error", "message": "File not found in S3" }
//! ```

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use s3_ingest_core::ingest::ingest_and_store;
use s3_ingest_core::models::{artifact_key, is_plain_artifact_name};
use s3_ingest_core::retrieve::{delete_artifact, list_logs, read_artifact, read_latest_artifact};
use s3_ingest_core::source::RecordSource;
use s3_ingest_core::store::ObjectStore;
use s3_ingest_core::Error;

use crate::config::Config;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub source: Arc<dyn RecordSource>,
}

impl AppState {
    pub fn new(store: Arc<dyn ObjectStore>, source: Arc<dyn RecordSource>) -> Self {
        Self { store, source }
    }
}

/// Build the router with every route registered.
///
/// A wrong method on a known path yields 405 and an unknown path 404,
/// both with the JSON error body.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health).fallback(method_not_allowed))
        .route("/ingest", post(handle_ingest).fallback(method_not_allowed))
        .route("/getdata", get(handle_get_data).fallback(method_not_allowed))
        .route("/listfiles", get(handle_list_files).fallback(method_not_allowed))
        .route("/latest", get(handle_latest).fallback(method_not_allowed))
        .route("/delete", delete(handle_delete).fallback(method_not_allowed))
        .fallback(route_not_found)
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP API.
///
/// Binds to the address configured in `[server]` (`PORT` overrides the
/// port) and serves the routes from [`router`] until the process is
/// terminated.
///
/// # Arguments
///
/// - `config`: application configuration; only `[server]` is read here.
/// - `state`: the object store and record source shared by all handlers.
///
/// # Returns
///
/// Returns `Ok(())` when the server shuts down, or an error if binding fails.
pub async fn run_server(config: &Config, state: AppState) -> anyhow::Result<()> {
    let bind_addr = config.server.bind_addr();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "starting server");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error body: `{status: "error", message}`.
#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: "error",
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

const FILE_NOT_FOUND: &str = "File not found in S3";

async fn method_not_allowed() -> AppError {
    AppError {
        status: StatusCode::METHOD_NOT_ALLOWED,
        message: "Method not allowed".to_string(),
    }
}

async fn route_not_found() -> AppError {
    not_found("Route not found")
}

/// `filename` query parameter shared by `/getdata` and `/delete`.
#[derive(Deserialize)]
struct FilenameQuery {
    filename: Option<String>,
}

type FilenameParam = Result<Query<FilenameQuery>, QueryRejection>;

/// Extract the artifact name, answering every client fault with a JSON 400.
///
/// `missing` is the route's message for an absent or empty `filename`.
fn required_filename(param: FilenameParam, missing: &str) -> Result<String, AppError> {
    let Query(query) = param.map_err(|rejection| {
        info!(error = %rejection.body_text(), "rejected query string");
        bad_request("Invalid query parameters")
    })?;
    let filename = query
        .filename
        .filter(|f| !f.is_empty())
        .ok_or_else(|| bad_request(missing))?;
    if !is_plain_artifact_name(&filename) {
        return Err(bad_request("Invalid 'filename' query parameter"));
    }
    Ok(filename)
}

// ============ GET /health ============

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "success",
        "message": "API is up and running",
    }))
}

// ============ POST /ingest ============

#[derive(Serialize)]
struct IngestResponse {
    status: &'static str,
    message: &'static str,
    filename: String,
    count: usize,
}

/// Handler for `POST /ingest`.
///
/// Any failure before the artifact is stored is a 500 carrying the error
/// message. A failed pointer update still reports success.
async fn handle_ingest(State(state): State<AppState>) -> Result<Json<IngestResponse>, AppError> {
    let result = ingest_and_store(state.source.as_ref(), state.store.as_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "ingestion failed");
            internal(e.to_string())
        })?;

    Ok(Json(IngestResponse {
        status: "success",
        message: "Data ingested and uploaded to S3 successfully",
        filename: result.filename,
        count: result.count,
    }))
}

// ============ GET /getdata ============

async fn handle_get_data(
    State(state): State<AppState>,
    query: FilenameParam,
) -> Result<Json<serde_json::Value>, AppError> {
    let filename = required_filename(query, "Missing 'filename' query parameter")?;
    info!(filename = %filename, "fetching artifact");

    let records = read_artifact(state.store.as_ref(), &artifact_key(&filename))
        .await
        .map_err(|e| match e {
            Error::NotFound { .. } => not_found(FILE_NOT_FOUND),
            other => {
                error!(filename = %filename, error = %other, "failed to fetch artifact");
                internal("Failed to fetch data from S3")
            }
        })?;

    Ok(Json(json!({
        "message": "Data Fetched Successfully",
        "records": records,
    })))
}

// ============ GET /listfiles ============

async fn handle_list_files(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let filenames = list_logs(state.store.as_ref()).await.map_err(|e| {
        error!(error = %e, "failed to list files");
        internal("Failed to list files from S3")
    })?;

    Ok(Json(json!({
        "status": "success",
        "message": "Files listed successfully",
        "filenames": filenames,
    })))
}

// ============ GET /latest ============

/// Handler for `GET /latest`.
///
/// 404 when no pointer exists; 500 when the pointer is corrupt or names an
/// artifact that cannot be read.
async fn handle_latest(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let latest = read_latest_artifact(state.store.as_ref())
        .await
        .map_err(|e| {
            if !e.is_not_found() {
                error!(error = %e, "failed to read latest ingestion");
            }
            match e {
                Error::NotFound { .. } => not_found(FILE_NOT_FOUND),
                Error::Decode(_) => internal("Invalid metadata format"),
                Error::InvalidPointer(_) => internal("Filename not found in metadata"),
                Error::DanglingPointer { .. } => internal("Failed to read ingested data"),
                _ => internal("Failed to fetch latest ingestion metadata"),
            }
        })?;

    Ok(Json(json!({
        "message": "Fetched Latest ingestion successfully",
        "metadata": latest.metadata,
        "data": latest.records,
    })))
}

// ============ DELETE /delete ============

async fn handle_delete(
    State(state): State<AppState>,
    query: FilenameParam,
) -> Result<Json<serde_json::Value>, AppError> {
    let filename = required_filename(query, "Missing filename query param")?;

    delete_artifact(state.store.as_ref(), &filename)
        .await
        .map_err(|e| {
            error!(filename = %filename, error = %e, "failed to delete file");
            internal("Failed to delete file")
        })?;
    info!(filename = %filename, "deleted artifact");

    Ok(Json(json!({
        "status": "success",
        "message": "File deleted successfully",
    })))
}
