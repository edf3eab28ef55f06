//! Upload session types and lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Unique identifier for an upload session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadId(Uuid);

impl UploadId {
    /// Generate a new random upload ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UploadId({})", self.0)
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of the upload controller.
///
/// ```text
/// Idle -> Allocating -> Streaming -> Finalizing -> Completed -> Idle
///              |             |            |
///              v             +------------+-----> Aborted -> Idle
///            Idle
/// ```
///
/// `Completed` and `Aborted` are passed through on the way back to `Idle`;
/// the outcome stays readable in [`SessionStatus::last_outcome`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No session owns the controller.
    #[default]
    Idle,
    /// Slot memory is being acquired for a new session.
    Allocating,
    /// The session is accepting chunks.
    Streaming,
    /// The final chunk arrived; waiting for the drain task to finish.
    Finalizing,
    /// The session was fully written.
    Completed,
    /// The session was cancelled or stalled.
    Aborted,
}

impl SessionState {
    /// Check if a session currently owns the controller.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Allocating | Self::Streaming | Self::Finalizing)
    }

    /// Lowercase name, as used in logs and API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Allocating => "allocating",
            Self::Streaming => "streaming",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a finished session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    Completed,
    Aborted,
}

impl SessionOutcome {
    /// The lifecycle state a session passes through when it ends this way.
    pub fn state(&self) -> SessionState {
        match self {
            Self::Completed => SessionState::Completed,
            Self::Aborted => SessionState::Aborted,
        }
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.state().fmt(f)
    }
}

/// Snapshot of the controller: which session (if any) and where it is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// The current or most recent session. `None` only before the first one.
    pub upload_id: Option<UploadId>,
    /// Current lifecycle state.
    pub state: SessionState,
    /// How `upload_id` ended, once it has.
    pub last_outcome: Option<SessionOutcome>,
}

/// Why a session was torn down without completing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The network connection dropped before the final chunk was processed.
    Disconnected,
    /// No new data arrived within the stall timeout.
    StallTimeout,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("client disconnected"),
            Self::StallTimeout => f.write_str("stall timeout"),
        }
    }
}

/// Summary record emitted once per completed session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    /// The session this summary belongs to.
    pub upload_id: UploadId,
    /// Destination path as given to the session.
    pub path: String,
    /// Bytes the storage backend accepted.
    pub bytes_ok: u64,
    /// Bytes lost to short or failed writes.
    pub bytes_not_ok: u64,
    /// Wall time from drain start to close, in milliseconds.
    pub elapsed_ms: u64,
    /// Number of slots drained.
    pub chunk_count: u64,
    /// When the drain task picked up the session.
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
}

impl UploadSummary {
    /// Total bytes the producer handed over.
    pub fn total_bytes(&self) -> u64 {
        self.bytes_ok + self.bytes_not_ok
    }

    /// Average throughput in bytes per millisecond.
    pub fn throughput_bytes_per_ms(&self) -> u64 {
        self.total_bytes() / self.elapsed_ms.max(1)
    }

    /// Whether every byte reached storage.
    pub fn is_clean(&self) -> bool {
        self.bytes_not_ok == 0
    }
}
