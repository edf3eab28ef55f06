//! The slot ring shared by the ingest writer and the drain task.
//!
//! # Ownership
//!
//! Each slot's `full` flag decides who may touch it:
//!
//! | `full`  | owner    | allowed                                   |
//! |---------|----------|-------------------------------------------|
//! | `false` | producer | copy bytes in, then [`Slot::publish`]     |
//! | `true`  | consumer | take the bytes out, then [`Slot::mark_drained`] |
//!
//! Only the producer sets the flag and only the consumer clears it. The
//! length is written before the flag is raised (`Release`) and read after it
//! is observed (`Acquire`). The per-slot mutex is therefore never contended
//! in normal operation; it only makes the hand-off expressible in safe Rust
//! and lets [`BufferPool::release`] reclaim a buffer from either side.

use crate::alloc::{AllocPolicy, SlotAllocator};
use crate::error::{IngestError, IngestResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// One fixed-capacity buffer in the ring.
pub struct Slot {
    data: Mutex<Option<Box<[u8]>>>,
    len: AtomicUsize,
    full: AtomicBool,
}

impl Slot {
    fn new(buf: Box<[u8]>) -> Self {
        Self {
            data: Mutex::new(Some(buf)),
            len: AtomicUsize::new(0),
            full: AtomicBool::new(false),
        }
    }

    fn data(&self) -> MutexGuard<'_, Option<Box<[u8]>>> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether the slot is waiting to be drained.
    pub fn is_full(&self) -> bool {
        self.full.load(Ordering::Acquire)
    }

    /// Copy `bytes` into the slot at `at`. Producer side, slot not full.
    ///
    /// Returns `false` if the slot memory has already been released.
    pub(crate) fn copy_in(&self, at: usize, bytes: &[u8]) -> bool {
        debug_assert!(!self.is_full());
        match self.data().as_mut() {
            Some(buf) => {
                buf[at..at + bytes.len()].copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }

    /// Hand the first `len` bytes over to the consumer.
    pub(crate) fn publish(&self, len: usize) {
        self.len.store(len, Ordering::Relaxed);
        self.full.store(true, Ordering::Release);
    }

    /// Take the buffer and its fill length out for writing. Consumer side.
    pub(crate) fn take_filled(&self) -> Option<(Box<[u8]>, usize)> {
        if !self.is_full() {
            return None;
        }
        let len = self.len.load(Ordering::Relaxed);
        self.data().take().map(|buf| (buf, len))
    }

    /// Put the buffer back and give the slot to the producer again.
    pub(crate) fn mark_drained(&self, buf: Box<[u8]>) {
        *self.data() = Some(buf);
        self.len.store(0, Ordering::Relaxed);
        self.full.store(false, Ordering::Release);
    }

    fn reclaim(&self) -> Option<Box<[u8]>> {
        self.data().take()
    }
}

/// A session's ring of equally sized slots.
pub struct BufferPool {
    slots: Box<[Slot]>,
    chunk_size: usize,
    allocator: Arc<dyn SlotAllocator>,
}

impl BufferPool {
    /// Acquire `policy.buffer_count` slots, halving the slot size after each
    /// failed attempt.
    ///
    /// A failed attempt frees whatever it had already allocated before the
    /// next one starts, so at most one attempt's worth of memory is ever held.
    /// A ring needs at least two slots; smaller counts are rejected before
    /// anything is allocated.
    pub fn acquire(allocator: Arc<dyn SlotAllocator>, policy: &AllocPolicy) -> IngestResult<Self> {
        if policy.buffer_count < 2 {
            return Err(sluice_core::Error::InvalidConfig(format!(
                "buffer_count must be at least 2, got {}",
                policy.buffer_count
            ))
            .into());
        }

        let mut attempts = 0;
        let mut last_size = policy.chunk_size;

        for chunk_size in policy.attempt_sizes() {
            attempts += 1;
            last_size = chunk_size;

            if let Some(buffers) = allocate_all(allocator.as_ref(), policy.buffer_count, chunk_size)
            {
                if attempts > 1 {
                    tracing::info!(
                        chunk_size,
                        requested = policy.chunk_size,
                        attempts,
                        "Slot allocation succeeded with reduced chunk size"
                    );
                }
                let slots = buffers.into_iter().map(Slot::new).collect();
                return Ok(Self {
                    slots,
                    chunk_size,
                    allocator,
                });
            }

            tracing::debug!(
                chunk_size,
                buffer_count = policy.buffer_count,
                attempt = attempts,
                "Slot allocation failed, halving chunk size"
            );
        }

        Err(IngestError::OutOfMemory {
            buffer_count: policy.buffer_count,
            chunk_size: last_size,
            attempts,
        })
    }

    /// Size of every slot.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of slots in the ring.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false: a pool holds at least two slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The slot at ring position `index`.
    pub fn slot(&self, index: usize) -> &Slot {
        &self.slots[index % self.slots.len()]
    }

    /// Next ring position after `index`.
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.slots.len()
    }

    /// Return every slot buffer to the allocator.
    ///
    /// Idempotent: buffers already released (or never handed back by a
    /// failed write) are skipped.
    pub fn release(&self) {
        for slot in self.slots.iter() {
            if let Some(buf) = slot.reclaim() {
                self.allocator.free(buf);
            }
        }
    }

    /// Whether any slot still holds memory.
    pub fn is_released(&self) -> bool {
        self.slots.iter().all(|slot| slot.data().is_none())
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        self.release();
    }
}

fn allocate_all(
    allocator: &dyn SlotAllocator,
    count: usize,
    chunk_size: usize,
) -> Option<Vec<Box<[u8]>>> {
    let mut buffers = Vec::with_capacity(count);
    for _ in 0..count {
        match allocator.allocate(chunk_size) {
            Some(buf) => buffers.push(buf),
            None => {
                for buf in buffers {
                    allocator.free(buf);
                }
                return None;
            }
        }
    }
    Some(buffers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::HeapAllocator;

    fn policy(chunk_size: usize) -> AllocPolicy {
        AllocPolicy {
            buffer_count: 2,
            chunk_size,
            min_chunk_size: 4,
            max_attempts: 2,
        }
    }

    #[test]
    fn test_acquire_builds_ring() {
        let pool = BufferPool::acquire(Arc::new(HeapAllocator), &policy(8)).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.chunk_size(), 8);
        assert_eq!(pool.next_index(0), 1);
        assert_eq!(pool.next_index(1), 0);
        assert!(!pool.slot(0).is_full());
        assert!(!pool.is_released());
    }

    #[test]
    fn test_slot_handoff() {
        let pool = BufferPool::acquire(Arc::new(HeapAllocator), &policy(8)).unwrap();
        let slot = pool.slot(0);

        assert!(slot.take_filled().is_none(), "empty slot is not drainable");
        assert!(slot.copy_in(0, b"ABC"));
        assert!(slot.copy_in(3, b"D"));
        slot.publish(4);
        assert!(slot.is_full());

        let (buf, len) = slot.take_filled().unwrap();
        assert_eq!(&buf[..len], b"ABCD");
        slot.mark_drained(buf);
        assert!(!slot.is_full());
        assert!(slot.copy_in(0, b"EFGHIJKL"));
    }

    #[test]
    fn test_release_is_idempotent() {
        let pool = BufferPool::acquire(Arc::new(HeapAllocator), &policy(8)).unwrap();
        pool.release();
        assert!(pool.is_released());
        pool.release();
        assert!(pool.is_released());
        assert!(!pool.slot(1).copy_in(0, b"x"), "released slot refuses writes");
    }

    #[test]
    fn test_acquire_rejects_rings_below_two_slots() {
        for buffer_count in [0, 1] {
            let policy = AllocPolicy {
                buffer_count,
                ..policy(8)
            };
            match BufferPool::acquire(Arc::new(HeapAllocator), &policy) {
                Err(IngestError::Config(sluice_core::Error::InvalidConfig(msg))) => {
                    assert!(msg.contains("buffer_count"), "{msg}");
                }
                Err(other) => panic!("expected Config error, got {other}"),
                Ok(pool) => panic!("acquired a ring of {} slots", pool.len()),
            }
        }
    }

    #[test]
    fn test_acquire_out_of_memory() {
        let err = BufferPool::acquire(Arc::new(HeapAllocator), &policy(usize::MAX)).err();
        match err {
            Some(IngestError::OutOfMemory {
                buffer_count,
                chunk_size,
                attempts,
            }) => {
                assert_eq!(buffer_count, 2);
                assert_eq!(chunk_size, usize::MAX / 2);
                assert_eq!(attempts, 2);
            }
            other => panic!("expected OutOfMemory, got {:?}", other.map(|e| e.to_string())),
        }
    }
}
