//! Block storage abstraction and backends for sluice.
//!
//! This crate provides:
//! - Streaming writes with temp-file staging (nothing visible until finish)
//! - Short-write reporting instead of hard failures on the write path
//! - Backends: local filesystem, plus an in-memory store with fault
//!   injection behind the `test-utils` feature

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemBackend;
#[cfg(any(test, feature = "test-utils"))]
pub use backends::memory::MemoryBackend;
pub use error::{StorageError, StorageResult};
pub use traits::{ObjectStore, StreamingUpload};

use sluice_core::config::StorageConfig;
use std::sync::Arc;

/// Create an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
    }
}
