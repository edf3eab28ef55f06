//! Core domain types for the sluice upload spooler.
//!
//! This crate defines the data model shared by the other crates:
//! - Upload identifiers and the session lifecycle states
//! - The per-session summary record
//! - Destination path validation
//! - Configuration for the server, storage and ingest pipeline

pub mod config;
pub mod dest_path;
pub mod error;
pub mod upload;

pub use dest_path::DestinationPath;
pub use error::{Error, Result};
pub use upload::{
    AbortReason, SessionOutcome, SessionState, SessionStatus, UploadId, UploadSummary,
};

/// Default slot size: 16 KiB. Larger slots speed up writes to slow block storage.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Smallest slot size the allocator will fall back to.
pub const MIN_CHUNK_SIZE: usize = 256;

/// Default number of slots in the ring.
pub const DEFAULT_BUFFER_COUNT: usize = 2;

/// Default number of allocation attempts (each retry halves the slot size).
pub const DEFAULT_ALLOC_ATTEMPTS: usize = 2;

/// Default idle time after which the drain task gives up on a producer: 20 s.
pub const DEFAULT_STALL_TIMEOUT_MS: u64 = 20_000;
