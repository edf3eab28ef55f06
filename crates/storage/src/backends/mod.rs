//! Storage backend implementations.

pub mod filesystem;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
