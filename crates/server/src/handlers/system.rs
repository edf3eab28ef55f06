//! Health and status endpoints.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;
use sluice_core::{SessionOutcome, SessionState, UploadId};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backend: &'static str,
}

/// GET /v1/health - Health check.
///
/// Fails with 503 when the storage root is not reachable (card removed).
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.storage.health_check().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        backend: state.storage.backend_name(),
    }))
}

/// Upload controller status.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// The current or most recent session.
    pub upload_id: Option<UploadId>,
    pub state: SessionState,
    /// How `upload_id` ended, once it has.
    pub last_outcome: Option<SessionOutcome>,
    /// Seconds since the last upload chunk arrived.
    pub idle_secs: u64,
    /// Whether a drain is holding background work paused.
    pub background_paused: bool,
    pub buffer_count: usize,
    pub chunk_size: usize,
}

/// GET /v1/status - Upload controller state.
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.controller.status();
    let ingest = state.controller.config();

    Json(StatusResponse {
        upload_id: status.upload_id,
        state: status.state,
        last_outcome: status.last_outcome,
        idle_secs: state.activity.idle().as_secs(),
        background_paused: state.activity.background_paused(),
        buffer_count: ingest.buffer_count,
        chunk_size: ingest.chunk_size,
    })
}
