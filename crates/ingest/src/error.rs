//! Ingest pipeline error types.

use sluice_core::{AbortReason, SessionState};
use thiserror::Error;

/// Errors surfaced to the producer side of an upload.
///
/// Write shortfalls never appear here: the drain task counts them in the
/// session summary instead.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(
        "out of memory: could not allocate {buffer_count} slots \
         (last attempt {chunk_size} bytes each, {attempts} attempts)"
    )]
    OutOfMemory {
        buffer_count: usize,
        chunk_size: usize,
        attempts: usize,
    },

    #[error("another upload session is {state}")]
    SessionBusy { state: SessionState },

    #[error("upload aborted: {0}")]
    Aborted(AbortReason),

    #[error("unexpected chunk offset: expected {expected}, got {actual}")]
    UnexpectedOffset { expected: u64, actual: u64 },

    #[error("upload session already received its final chunk")]
    SessionClosed,

    #[error("drain worker is not running")]
    WorkerGone,

    #[error("configuration error: {0}")]
    Config(#[from] sluice_core::Error),
}

/// Result type for ingest operations.
pub type IngestResult<T> = std::result::Result<T, IngestError>;
