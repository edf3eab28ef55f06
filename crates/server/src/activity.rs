//! Platform hooks for the server process.
//!
//! Tracks when the last upload chunk arrived and whether background work is
//! paused by a running drain.

use sluice_ingest::PlatformHooks;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Activity tracker handed to the upload controller as its platform hooks.
#[derive(Debug)]
pub struct ActivityTracker {
    started: Instant,
    /// Milliseconds after `started` of the last recorded activity.
    last_activity_ms: AtomicU64,
    background_paused: AtomicBool,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
            background_paused: AtomicBool::new(false),
        }
    }

    /// Time since the last upload chunk (or since startup).
    pub fn idle(&self) -> Duration {
        let last = Duration::from_millis(self.last_activity_ms.load(Ordering::Relaxed));
        self.started.elapsed().saturating_sub(last)
    }

    /// Whether a drain currently holds background work paused.
    pub fn background_paused(&self) -> bool {
        self.background_paused.load(Ordering::Relaxed)
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformHooks for ActivityTracker {
    fn feed_watchdog(&self) {
        tracing::trace!("Drain progress");
    }

    fn pause_background(&self) {
        self.background_paused.store(true, Ordering::Relaxed);
        tracing::debug!("Background work paused for upload");
    }

    fn resume_background(&self) {
        self.background_paused.store(false, Ordering::Relaxed);
        tracing::debug!("Background work resumed");
    }

    fn touch_activity(&self) {
        let now = self.started.elapsed().as_millis() as u64;
        self.last_activity_ms.store(now, Ordering::Relaxed);
    }
}
