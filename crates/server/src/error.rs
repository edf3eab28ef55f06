//! API error types.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sluice_ingest::IngestError;
use sluice_storage::StorageError;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("upload stream error: {0}")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] sluice_core::Error),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
            Self::Multipart(_) => "multipart_error",
            Self::Ingest(e) => match e {
                IngestError::OutOfMemory { .. } => "out_of_memory",
                IngestError::SessionBusy { .. } => "session_busy",
                IngestError::Aborted(_) => "upload_aborted",
                IngestError::UnexpectedOffset { .. } => "unexpected_offset",
                IngestError::SessionClosed => "session_closed",
                IngestError::WorkerGone => "worker_gone",
                IngestError::Config(_) => "invalid_config",
            },
            Self::Storage(_) => "storage_error",
            Self::Core(e) => match e {
                sluice_core::Error::InvalidPath(_) => "invalid_path",
                sluice_core::Error::InvalidConfig(_) => "invalid_config",
            },
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Multipart(e) => e.status(),
            Self::Ingest(e) => match e {
                IngestError::OutOfMemory { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                IngestError::SessionBusy { .. } => StatusCode::CONFLICT,
                IngestError::Aborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
                IngestError::UnexpectedOffset { .. } => StatusCode::BAD_REQUEST,
                IngestError::SessionClosed => StatusCode::CONFLICT,
                IngestError::WorkerGone => StatusCode::SERVICE_UNAVAILABLE,
                IngestError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Storage(e) => match e {
                StorageError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Core(e) => match e {
                sluice_core::Error::InvalidPath(_) => StatusCode::BAD_REQUEST,
                sluice_core::Error::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
