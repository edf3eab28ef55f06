//! Common test utilities for the ingest pipeline.
//!
//! Note: #[allow(dead_code)] because each test file compiles common/ separately.

use sluice_core::config::IngestConfig;
use sluice_core::{SessionOutcome, SessionState, SessionStatus};
use sluice_ingest::{PlatformHooks, SlotAllocator, UploadController};
use sluice_storage::{MemoryBackend, ObjectStore};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Allocator that counts every byte it hands out and can be told to fail.
#[allow(dead_code)]
#[derive(Default)]
pub struct CountingAllocator {
    outstanding: AtomicUsize,
    peak: AtomicUsize,
    allocations: AtomicUsize,
    frees: AtomicUsize,
    calls: AtomicUsize,
    /// Requests larger than this fail.
    max_len: Mutex<Option<usize>>,
    /// Zero-based call indices that fail.
    fail_calls: Mutex<HashSet<usize>>,
    requested: Mutex<Vec<usize>>,
}

#[allow(dead_code)]
impl CountingAllocator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail every request larger than `len` bytes.
    pub fn with_max_len(len: usize) -> Arc<Self> {
        let allocator = Self::default();
        *allocator.max_len.lock().unwrap() = Some(len);
        Arc::new(allocator)
    }

    /// Fail the given calls (zero-based, counted across the allocator's life).
    pub fn failing_calls(calls: &[usize]) -> Arc<Self> {
        let allocator = Self::default();
        allocator.fail_calls.lock().unwrap().extend(calls.iter().copied());
        Arc::new(allocator)
    }

    pub fn outstanding_bytes(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn peak_bytes(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    pub fn frees(&self) -> usize {
        self.frees.load(Ordering::SeqCst)
    }

    /// Sizes of every request, failed ones included.
    pub fn requested(&self) -> Vec<usize> {
        self.requested.lock().unwrap().clone()
    }
}

impl SlotAllocator for CountingAllocator {
    fn allocate(&self, len: usize) -> Option<Box<[u8]>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(len);

        if self.fail_calls.lock().unwrap().contains(&call) {
            return None;
        }
        if let Some(max) = *self.max_len.lock().unwrap()
            && len > max
        {
            return None;
        }

        self.allocations.fetch_add(1, Ordering::SeqCst);
        let now = self.outstanding.fetch_add(len, Ordering::SeqCst) + len;
        self.peak.fetch_max(now, Ordering::SeqCst);
        Some(vec![0u8; len].into_boxed_slice())
    }

    fn free(&self, buf: Box<[u8]>) {
        self.frees.fetch_add(1, Ordering::SeqCst);
        self.outstanding.fetch_sub(buf.len(), Ordering::SeqCst);
    }
}

/// Hooks that count how often each platform callback ran.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingHooks {
    pub watchdog: AtomicUsize,
    pub paused: AtomicUsize,
    pub resumed: AtomicUsize,
    pub activity: AtomicUsize,
}

#[allow(dead_code)]
impl RecordingHooks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl PlatformHooks for RecordingHooks {
    fn feed_watchdog(&self) {
        self.watchdog.fetch_add(1, Ordering::SeqCst);
    }

    fn pause_background(&self) {
        self.paused.fetch_add(1, Ordering::SeqCst);
    }

    fn resume_background(&self) {
        self.resumed.fetch_add(1, Ordering::SeqCst);
    }

    fn touch_activity(&self) {
        self.activity.fetch_add(1, Ordering::SeqCst);
    }
}

/// Small ring for tests: `buffer_count` slots of `chunk_size` bytes.
#[allow(dead_code)]
pub fn ingest_config(buffer_count: usize, chunk_size: usize) -> IngestConfig {
    IngestConfig {
        buffer_count,
        chunk_size,
        min_chunk_size: 1,
        alloc_attempts: 2,
        stall_timeout_ms: 5_000,
    }
}

/// A controller over a fresh memory backend, with instrumented parts.
#[allow(dead_code)]
pub struct Harness {
    pub controller: UploadController,
    pub store: MemoryBackend,
    pub allocator: Arc<CountingAllocator>,
    pub hooks: Arc<RecordingHooks>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(config: IngestConfig) -> Self {
        Self::with_allocator(config, CountingAllocator::new())
    }

    pub fn with_allocator(config: IngestConfig, allocator: Arc<CountingAllocator>) -> Self {
        let store = MemoryBackend::new();
        let hooks = RecordingHooks::new();
        let controller = UploadController::with_parts(
            config,
            Arc::new(store.clone()) as Arc<dyn ObjectStore>,
            hooks.clone(),
            allocator.clone(),
        )
        .expect("valid test config");
        Self {
            controller,
            store,
            allocator,
            hooks,
        }
    }
}

/// Wait for the controller to settle back to `Idle` after a session ended
/// with `outcome`.
#[allow(dead_code)]
pub async fn wait_for_outcome(
    controller: &UploadController,
    outcome: SessionOutcome,
) -> SessionStatus {
    let mut rx = controller.subscribe();
    let status = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|status| {
            status.state == SessionState::Idle && status.last_outcome == Some(outcome)
        }),
    )
    .await
    .unwrap_or_else(|_| panic!("no session ended {outcome}"))
    .expect("lifecycle channel closed");
    *status
}

/// Deterministic test data.
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    let mut state = seed;
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }
    data
}
