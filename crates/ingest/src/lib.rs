//! Bounded-memory ingest pipeline for sluice.
//!
//! An upload arrives as a sequence of chunks with arbitrary sizes and is
//! persisted to slow storage through a small ring of fixed-size slots:
//!
//! ```text
//! network -> UploadSession::handle_chunk -> IngestWriter
//!         -> [slot ring] -> drain task -> ObjectStore
//! ```
//!
//! - [`BufferPool`] acquires the slots, halving the slot size when memory is
//!   short.
//! - [`IngestWriter`] fills slots in the producer's task and suspends while
//!   the next slot is still being drained, so resident memory never exceeds
//!   `buffer_count * chunk_size`.
//! - The drain task writes full slots in ring order, counts short writes
//!   instead of failing, and tears the session down on disconnect or stall.
//! - [`UploadController`] allows one session at a time and tracks its
//!   lifecycle.

pub mod alloc;
mod drain;
pub mod error;
pub mod hooks;
pub mod pool;
pub mod session;
pub mod signal;
pub mod writer;

pub use alloc::{AllocPolicy, HeapAllocator, SlotAllocator};
pub use error::{IngestError, IngestResult};
pub use hooks::{NoopHooks, PlatformHooks};
pub use pool::BufferPool;
pub use session::{DisconnectHook, UploadController, UploadSession};
pub use signal::SessionSignals;
pub use writer::{ChunkOutcome, IngestWriter};
