//! Slot memory allocation.
//!
//! Slots come from a [`SlotAllocator`] so that callers can model a
//! constrained heap (and tests can force failures at any depth). The
//! default [`HeapAllocator`] uses fallible reservation, so running out of
//! memory is reported instead of aborting the process.

use sluice_core::config::IngestConfig;

/// Source of fixed-size slot buffers.
pub trait SlotAllocator: Send + Sync + 'static {
    /// Allocate a zeroed buffer of exactly `len` bytes, or `None` when the
    /// memory is not available.
    fn allocate(&self, len: usize) -> Option<Box<[u8]>>;

    /// Return a buffer obtained from [`SlotAllocator::allocate`].
    fn free(&self, buf: Box<[u8]>) {
        drop(buf);
    }
}

/// Allocates slots on the global heap.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapAllocator;

impl SlotAllocator for HeapAllocator {
    fn allocate(&self, len: usize) -> Option<Box<[u8]>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(len).ok()?;
        buf.resize(len, 0);
        Some(buf.into_boxed_slice())
    }
}

/// Shrink-and-retry policy for acquiring a session's slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocPolicy {
    /// Slots in the ring.
    pub buffer_count: usize,
    /// Slot size tried first.
    pub chunk_size: usize,
    /// Slot sizes below this are never tried.
    pub min_chunk_size: usize,
    /// Total attempts, halving the slot size after each failure.
    pub max_attempts: usize,
}

impl AllocPolicy {
    /// The slot sizes the policy will try, in order.
    pub fn attempt_sizes(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(Some(self.chunk_size), |size| Some(size / 2))
            .take(self.max_attempts)
            .take_while(|size| *size >= self.min_chunk_size && *size > 0)
    }
}

impl From<&IngestConfig> for AllocPolicy {
    fn from(config: &IngestConfig) -> Self {
        Self {
            buffer_count: config.buffer_count,
            chunk_size: config.chunk_size,
            min_chunk_size: config.min_chunk_size,
            max_attempts: config.alloc_attempts,
        }
    }
}
