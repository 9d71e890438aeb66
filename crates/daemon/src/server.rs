//! Coordinator HTTP API
//!
//! Serves the claim protocol to workers plus queue control, scan triggers,
//! single-file events and metrics.

use crate::jobs::{Job, JobStatusUpdate};
use crate::metrics::{snapshot, MetricsSnapshot, SharedSystemMetrics};
use crate::profiles::{ProfileError, ProfileStore};
use crate::queue::{JobQueue, QueueError, QueueState};
use crate::scan::enqueue_library;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use castcode_config::{Config, EncodingProfile};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Reason recorded when a pause request names none.
pub const DEFAULT_PAUSE_REASON: &str = "Paused via API";

/// Errors that can occur when running the API server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<JobQueue>,
    pub config: Arc<Config>,
    /// Live profiles; `config.profiles` is only the startup seed.
    pub profiles: Arc<ProfileStore>,
    pub system: SharedSystemMetrics,
}

/// JSON error body `{detail}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::InvalidInput(detail) => Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail),
            QueueError::NotFound(id) => Self::new(StatusCode::NOT_FOUND, format!("Job {} not found", id)),
        }
    }
}

impl From<ProfileError> for ApiError {
    fn from(e: ProfileError) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PauseRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub library: Option<String>,
    /// Overrides the library root for this scan only.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ScanResponse {
    pub scheduled: Vec<String>,
}

/// Body of `POST /api/config/encoding`: the profile fields plus its name.
#[derive(Debug, Deserialize)]
pub struct EncodingUpdate {
    pub name: String,
    #[serde(flatten)]
    pub profile: EncodingProfile,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct EncodingUpdated {
    pub name: String,
    pub profile: EncodingProfile,
}

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub path: PathBuf,
    #[serde(default)]
    pub library: Option<String>,
}

async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "libraries": state.config.libraries.len() }))
}

async fn readyz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ready" }))
}

/// Effective configuration, with the live profile table.
async fn get_config(State(state): State<AppState>) -> Json<Config> {
    let mut config = Config::clone(&state.config);
    config.profiles = state.profiles.all().await;
    Json(config)
}

async fn update_encoding(
    State(state): State<AppState>,
    Json(update): Json<EncodingUpdate>,
) -> Result<Json<EncodingUpdated>, ApiError> {
    let profile = state.profiles.upsert(&update.name, update.profile).await?;
    Ok(Json(EncodingUpdated {
        name: update.name,
        profile,
    }))
}

async fn list_jobs(State(state): State<AppState>) -> Json<Vec<Job>> {
    Json(state.queue.list_jobs().await)
}

/// 200 with a claimed job, 204 when idle, 409 when paused.
async fn next_job(State(state): State<AppState>) -> Response {
    if let Some(job) = state.queue.claim_next().await {
        return (StatusCode::OK, Json(job)).into_response();
    }

    let queue_state = state.queue.queue_state().await;
    if queue_state.paused {
        return (
            StatusCode::CONFLICT,
            Json(json!({
                "paused": true,
                "reason": queue_state.reason,
                "detail": "Queue paused",
            })),
        )
            .into_response();
    }

    StatusCode::NO_CONTENT.into_response()
}

async fn report_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<JobStatusUpdate>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.queue.report_status(&id, &update).await?))
}

async fn queue_state(State(state): State<AppState>) -> Json<QueueState> {
    Json(state.queue.queue_state().await)
}

async fn pause_queue(
    State(state): State<AppState>,
    body: Option<Json<PauseRequest>>,
) -> Json<QueueState> {
    let reason = body
        .and_then(|Json(request)| request.reason)
        .filter(|reason| !reason.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PAUSE_REASON.to_string());
    Json(state.queue.pause(Some(reason)).await)
}

async fn resume_queue(State(state): State<AppState>) -> Json<QueueState> {
    Json(state.queue.resume().await)
}

/// Schedule background scans; responds before they finish.
async fn scan(
    State(state): State<AppState>,
    body: Option<Json<ScanRequest>>,
) -> Result<(StatusCode, Json<ScanResponse>), ApiError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();

    let mut targets = Vec::new();
    match (request.library, request.root) {
        (Some(name), root) => {
            let library = state.config.libraries.get(&name).ok_or_else(|| {
                ApiError::new(StatusCode::NOT_FOUND, format!("Unknown library: {}", name))
            })?;
            let mut library = library.clone();
            if let Some(root) = root {
                library.root = root;
            }
            targets.push((name, library));
        }
        (None, Some(root)) => {
            let (name, library) = state.config.library_for_path(&root).ok_or_else(|| {
                ApiError::new(
                    StatusCode::BAD_REQUEST,
                    format!("No library contains {}", root.display()),
                )
            })?;
            let mut library = library.clone();
            library.root = root;
            targets.push((name.to_string(), library));
        }
        (None, None) => {
            targets.extend(
                state
                    .config
                    .libraries
                    .iter()
                    .map(|(name, library)| (name.clone(), library.clone())),
            );
        }
    }

    let scheduled: Vec<String> = targets.iter().map(|(name, _)| name.clone()).collect();
    info!(libraries = ?scheduled, "Scan scheduled");

    let queue = Arc::clone(&state.queue);
    let profiles = Arc::clone(&state.profiles);
    tokio::spawn(async move {
        for (name, library) in targets {
            let profile = profiles.get(&library.profile).await;
            enqueue_library(&queue, &name, &library, profile.as_ref()).await;
        }
    });

    Ok((StatusCode::ACCEPTED, Json(ScanResponse { scheduled })))
}

/// Enqueue one file reported by an external watcher.
async fn file_event(
    State(state): State<AppState>,
    Json(event): Json<EventRequest>,
) -> Result<Json<Job>, ApiError> {
    let (name, library) = match &event.library {
        Some(name) => state
            .config
            .libraries
            .get_key_value(name)
            .map(|(name, library)| (name.as_str(), library)),
        None => state.config.library_for_path(&event.path),
    }
    .ok_or_else(|| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("Cannot resolve library for {}", event.path.display()),
        )
    })?;

    let profile = state.profiles.get(&library.profile).await;
    match state
        .queue
        .enqueue(event.path.clone(), name, &library.profile, profile)
        .await
    {
        Ok(job) => Ok(Json(job)),
        Err(QueueError::InvalidInput(detail)) => {
            warn!(path = %event.path.display(), reason = %detail, "Event rejected");
            Err(ApiError::new(StatusCode::CONFLICT, detail))
        }
        Err(e) => Err(e.into()),
    }
}

async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(snapshot(&state.queue, &state.system).await)
}

/// Creates the axum Router with every coordinator endpoint
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/healthz", get(healthz))
        .route("/api/readyz", get(readyz))
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/next", get(next_job))
        .route("/api/jobs/:id/status", post(report_status))
        .route("/api/queue/state", get(queue_state))
        .route("/api/queue/pause", post(pause_queue))
        .route("/api/queue/resume", post(resume_queue))
        .route("/api/scan", post(scan))
        .route("/api/events", post(file_event))
        .route("/api/metrics", get(get_metrics))
        .route("/api/config", get(get_config))
        .route("/api/config/encoding", post(update_encoding))
        .with_state(state)
}

/// Runs the API server on `listener` until it fails.
///
/// # Returns
/// * `Ok(())` if server shuts down gracefully
/// * `Err(ServerError)` if serving fails
pub async fn run_server(listener: tokio::net::TcpListener, state: AppState) -> Result<(), ServerError> {
    let app = create_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
