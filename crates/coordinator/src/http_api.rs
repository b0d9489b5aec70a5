//! HTTP status API
//!
//! Read-only endpoints for watching a run: health, scheduler status and the
//! worker registry.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use runtime_core::{WorkerRegistryHandle, WorkerState};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::protocol::MasterRef;

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub master: MasterRef,
    pub registry: WorkerRegistryHandle,
}

/// Worker info for API response
#[derive(Debug, Serialize)]
pub struct WorkerResponse {
    pub id: String,
    pub status: WorkerState,
    pub busy: bool,
    pub last_heartbeat: i64,
    pub registered_at: i64,
    pub current_task: String,
    pub tasks_completed: u64,
}

/// Create the HTTP API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/status", get(get_status))
        .route("/api/workers", get(get_workers))
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

/// Scheduler status; unavailable once the master has stopped
async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    match state.master.status().await {
        Ok(status) => (StatusCode::OK, Json(serde_json::json!(status))),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}

async fn get_workers(State(state): State<AppState>) -> impl IntoResponse {
    let mut workers: Vec<WorkerResponse> = state
        .registry
        .all_workers()
        .into_iter()
        .map(|w| WorkerResponse {
            id: w.id,
            busy: w.state.is_busy(),
            status: w.state,
            last_heartbeat: w.last_heartbeat.timestamp_millis(),
            registered_at: w.registered_at.timestamp_millis(),
            current_task: w.current_task,
            tasks_completed: w.tasks_completed,
        })
        .collect();
    workers.sort_by(|a, b| a.id.cmp(&b.id));
    Json(workers)
}
