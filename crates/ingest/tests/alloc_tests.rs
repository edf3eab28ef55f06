//! Slot acquisition under memory pressure.

mod common;

use common::CountingAllocator;
use sluice_ingest::{AllocPolicy, BufferPool, IngestError};

fn policy(chunk_size: usize, min_chunk_size: usize, max_attempts: usize) -> AllocPolicy {
    AllocPolicy {
        buffer_count: 2,
        chunk_size,
        min_chunk_size,
        max_attempts,
    }
}

#[test]
fn test_first_attempt_uses_requested_size() {
    let allocator = CountingAllocator::new();
    let pool = BufferPool::acquire(allocator.clone(), &policy(4096, 256, 2)).unwrap();

    assert_eq!(pool.chunk_size(), 4096);
    assert_eq!(pool.len(), 2);
    assert_eq!(allocator.outstanding_bytes(), 8192);
    assert_eq!(allocator.requested(), vec![4096, 4096]);
}

#[test]
fn test_failure_at_each_depth_halves_chunk_size() {
    let attempts = 4;
    for depth in 0..attempts {
        let allowed = 4096 >> depth;
        let allocator = CountingAllocator::with_max_len(allowed);
        let pool = BufferPool::acquire(allocator.clone(), &policy(4096, 256, attempts))
            .unwrap_or_else(|e| panic!("depth {depth}: {e}"));

        assert_eq!(pool.chunk_size(), allowed, "depth {depth}");
        assert_eq!(allocator.outstanding_bytes(), 2 * allowed, "depth {depth}");
        // One failed request per shrink, then both slots at the final size.
        assert_eq!(allocator.requested().len(), depth + 2, "depth {depth}");
    }
}

#[test]
fn test_retries_exhausted_is_out_of_memory() {
    let allocator = CountingAllocator::with_max_len(1024);
    let err = BufferPool::acquire(allocator.clone(), &policy(16384, 256, 2))
        .err()
        .expect("two attempts cannot reach 1024");

    match err {
        IngestError::OutOfMemory {
            buffer_count,
            chunk_size,
            attempts,
        } => {
            assert_eq!(buffer_count, 2);
            assert_eq!(chunk_size, 8192);
            assert_eq!(attempts, 2);
        }
        other => panic!("expected OutOfMemory, got {other}"),
    }
    assert_eq!(allocator.outstanding_bytes(), 0);
    assert_eq!(allocator.requested(), vec![16384, 8192]);
}

#[test]
fn test_floor_stops_retries_early() {
    let allocator = CountingAllocator::with_max_len(0);
    let err = BufferPool::acquire(allocator.clone(), &policy(1024, 256, 10))
        .err()
        .expect("nothing can be allocated");

    match err {
        IngestError::OutOfMemory {
            chunk_size,
            attempts,
            ..
        } => {
            assert_eq!(chunk_size, 256);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected OutOfMemory, got {other}"),
    }
    assert_eq!(allocator.requested(), vec![1024, 512, 256]);
}

#[test]
fn test_partial_acquisition_is_freed_before_retry() {
    // First slot succeeds, second fails: the first must be returned.
    let allocator = CountingAllocator::failing_calls(&[1]);
    let pool = BufferPool::acquire(allocator.clone(), &policy(1024, 256, 2)).unwrap();

    assert_eq!(pool.chunk_size(), 512);
    assert_eq!(allocator.allocations(), 3);
    assert_eq!(allocator.frees(), 1);
    assert_eq!(allocator.outstanding_bytes(), 1024);
    assert_eq!(allocator.peak_bytes(), 1024);
}

#[test]
fn test_release_is_idempotent_and_drop_does_not_double_free() {
    let allocator = CountingAllocator::new();
    let pool = BufferPool::acquire(allocator.clone(), &policy(512, 256, 1)).unwrap();

    pool.release();
    assert_eq!(allocator.outstanding_bytes(), 0);
    assert_eq!(allocator.frees(), 2);

    pool.release();
    drop(pool);
    assert_eq!(allocator.frees(), 2);
}

#[test]
fn test_drop_releases_slots() {
    let allocator = CountingAllocator::new();
    let pool = BufferPool::acquire(allocator.clone(), &policy(512, 256, 1)).unwrap();
    assert_eq!(allocator.outstanding_bytes(), 1024);

    drop(pool);
    assert_eq!(allocator.outstanding_bytes(), 0);
}

#[test]
fn test_ring_below_two_slots_allocates_nothing() {
    for buffer_count in [0, 1] {
        let allocator = CountingAllocator::new();
        let policy = AllocPolicy {
            buffer_count,
            ..policy(4096, 256, 2)
        };

        let err = BufferPool::acquire(allocator.clone(), &policy)
            .err()
            .unwrap_or_else(|| panic!("{buffer_count} slots must be rejected"));
        assert!(matches!(err, IngestError::Config(_)), "{err}");
        assert!(allocator.requested().is_empty());
        assert_eq!(allocator.outstanding_bytes(), 0);
    }
}
