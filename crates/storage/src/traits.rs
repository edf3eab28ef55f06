//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;

/// Object store abstraction over slow block storage.
///
/// Keys are storage-relative paths using `/` as separator.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Open a destination for writing, creating parent directories.
    ///
    /// Nothing becomes visible at `key` until [`StreamingUpload::finish`]
    /// succeeds; [`StreamingUpload::abort`] discards everything written.
    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>>;

    /// Get the name of this storage backend.
    ///
    /// Returns a static string identifier for the backend type (e.g., "filesystem").
    /// Used for logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend availability.
    ///
    /// The default implementation returns Ok(()), suitable for backends that
    /// have nothing to probe.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// An open destination receiving a byte stream in order.
#[async_trait]
pub trait StreamingUpload: Send {
    /// Append `data` and return how many bytes the medium accepted.
    ///
    /// A return value below `data.len()` is a short write. Callers treat an
    /// error the same way as a write of zero bytes.
    async fn write(&mut self, data: &[u8]) -> StorageResult<usize>;

    /// Close the destination, making it visible, and return the bytes written.
    async fn finish(self: Box<Self>) -> StorageResult<u64>;

    /// Close and discard the destination.
    async fn abort(self: Box<Self>) -> StorageResult<()>;
}
