//! In-memory storage backend with fault injection.
//!
//! Only built for tests (`test-utils` feature). It records the size of every
//! write call and can simulate short writes, slow media and failed opens.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ObjectStore, StreamingUpload};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Default)]
struct Faults {
    fail_open: bool,
    short_writes: usize,
    write_delay: Option<Duration>,
}

#[derive(Default)]
struct MemoryInner {
    objects: Mutex<HashMap<String, Bytes>>,
    faults: Mutex<Faults>,
    write_log: Mutex<Vec<usize>>,
    open_uploads: AtomicUsize,
    aborted_uploads: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory object store. Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put_stream` fail.
    pub fn fail_open(&self, fail: bool) {
        lock(&self.inner.faults).fail_open = fail;
    }

    /// Make the next `count` writes accept only half of their input.
    pub fn short_writes(&self, count: usize) {
        lock(&self.inner.faults).short_writes = count;
    }

    /// Sleep this long inside every write, to model slow media.
    pub fn write_delay(&self, delay: Duration) {
        lock(&self.inner.faults).write_delay = Some(delay);
    }

    /// Requested length of every write call, in call order, across uploads.
    pub fn write_sizes(&self) -> Vec<usize> {
        lock(&self.inner.write_log).clone()
    }

    /// Content of a finished object.
    pub fn object(&self, key: &str) -> Option<Bytes> {
        lock(&self.inner.objects).get(key).cloned()
    }

    /// Number of finished objects.
    pub fn object_count(&self) -> usize {
        lock(&self.inner.objects).len()
    }

    /// Uploads opened and not yet finished, aborted or dropped.
    pub fn open_uploads(&self) -> usize {
        self.inner.open_uploads.load(Ordering::SeqCst)
    }

    /// Uploads closed through `abort`.
    pub fn aborted_uploads(&self) -> usize {
        self.inner.aborted_uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        if lock(&self.inner.faults).fail_open {
            return Err(StorageError::Unavailable(format!(
                "memory backend refused to open {key}"
            )));
        }
        self.inner.open_uploads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryUpload {
            key: key.to_string(),
            buffer: Vec::new(),
            inner: self.inner.clone(),
            closed: false,
        }))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryUpload {
    key: String,
    buffer: Vec<u8>,
    inner: Arc<MemoryInner>,
    closed: bool,
}

impl MemoryUpload {
    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.inner.open_uploads.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl StreamingUpload for MemoryUpload {
    async fn write(&mut self, data: &[u8]) -> StorageResult<usize> {
        lock(&self.inner.write_log).push(data.len());

        let (short, delay) = {
            let mut faults = lock(&self.inner.faults);
            let short = faults.short_writes > 0;
            if short {
                faults.short_writes -= 1;
            }
            (short, faults.write_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let accepted = if short { data.len() / 2 } else { data.len() };
        self.buffer.extend_from_slice(&data[..accepted]);
        Ok(accepted)
    }

    async fn finish(mut self: Box<Self>) -> StorageResult<u64> {
        self.close();
        let data = std::mem::take(&mut self.buffer);
        let len = data.len() as u64;
        lock(&self.inner.objects).insert(self.key.clone(), Bytes::from(data));
        Ok(len)
    }

    async fn abort(mut self: Box<Self>) -> StorageResult<()> {
        self.close();
        self.inner.aborted_uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MemoryUpload {
    fn drop(&mut self) {
        self.close();
    }
}
