//! Notifications between the producer, the drain task and disconnect hooks.

use sluice_core::AbortReason;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Completion and cancellation requests for one session.
///
/// Completion and abort are independent: setting one never clears the
/// other, and readers check [`SessionSignals::abort_reason`] first.
#[derive(Debug, Default)]
pub struct SessionSignals {
    completion_requested: AtomicBool,
    abort: OnceLock<AbortReason>,
    /// Wakes the drain task: a slot was published or a request was made.
    pub(crate) filled: Notify,
    /// Wakes the producer: a slot was drained or the session was aborted.
    pub(crate) freed: Notify,
}

impl SessionSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the drain task to finish once every full slot is written.
    pub fn request_completion(&self) {
        self.completion_requested.store(true, Ordering::Release);
        self.filled.notify_one();
    }

    pub fn completion_requested(&self) -> bool {
        self.completion_requested.load(Ordering::Acquire)
    }

    /// Cancel the session. The first reason wins; returns whether this call
    /// set it.
    pub fn request_abort(&self, reason: AbortReason) -> bool {
        let first = self.abort.set(reason).is_ok();
        self.filled.notify_one();
        self.freed.notify_one();
        first
    }

    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.abort.get().copied()
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.get().is_some()
    }
}
