//! Platform integration points called by the ingest pipeline.

/// Callbacks into the host platform.
///
/// Every method defaults to a no-op so embedders implement only what their
/// platform has.
pub trait PlatformHooks: Send + Sync + 'static {
    /// Reset the liveness supervisor. Called after every drained slot.
    fn feed_watchdog(&self) {}

    /// Pause other background activity while a drain runs.
    fn pause_background(&self) {}

    /// Undo [`PlatformHooks::pause_background`]. Called on every drain exit.
    fn resume_background(&self) {}

    /// Record that a chunk arrived (resets idle or sleep timers).
    fn touch_activity(&self) {}
}

/// Hooks that do nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHooks;

impl PlatformHooks for NoopHooks {}
