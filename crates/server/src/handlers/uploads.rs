//! Explorer upload endpoint.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Multipart, Query, State};
use serde::{Deserialize, Serialize};
use sluice_core::{DestinationPath, UploadId};

/// Query parameters for an explorer upload.
#[derive(Debug, Deserialize)]
pub struct UploadParams {
    /// Target folder; defaults to the storage root.
    pub path: Option<String>,
}

/// Response for a completed upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub upload_id: UploadId,
    pub path: String,
    pub bytes_ok: u64,
    pub bytes_not_ok: u64,
    pub elapsed_ms: u64,
    pub chunk_count: u64,
}

/// POST /explorer?path=<folder> - Stream a multipart file to storage.
///
/// The first field carrying a file name is written to
/// `<folder>/<file name>`. The response is sent only after the file has
/// been closed on storage. If the client goes away mid-transfer the handler
/// future is dropped, which cancels the session and discards the partial
/// file.
#[tracing::instrument(skip_all, fields(folder = ?params.path))]
pub async fn upload_file(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(mut field) = multipart.next_field().await? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let destination = DestinationPath::join(params.path.as_deref(), &file_name)?;

        let mut session = state.controller.start_session(destination.as_str()).await?;
        tracing::debug!(
            upload_id = %session.id(),
            destination = %destination,
            "Receiving explorer upload"
        );

        // A stream error returns early; dropping the session cancels it.
        while let Some(chunk) = field.chunk().await? {
            session
                .handle_chunk(session.next_offset(), &chunk, false)
                .await?;
        }

        let outcome = session.handle_chunk(session.next_offset(), &[], true).await?;
        let summary = outcome
            .summary()
            .cloned()
            .ok_or_else(|| ApiError::Internal("final chunk did not complete".to_string()))?;

        return Ok(Json(UploadResponse {
            upload_id: summary.upload_id,
            path: destination.to_string(),
            bytes_ok: summary.bytes_ok,
            bytes_not_ok: summary.bytes_not_ok,
            elapsed_ms: summary.elapsed_ms,
            chunk_count: summary.chunk_count,
        }));
    }

    Err(ApiError::BadRequest(
        "multipart body has no file field".to_string(),
    ))
}
