//! Application state shared across handlers.

use crate::activity::ActivityTracker;
use sluice_core::config::AppConfig;
use sluice_ingest::{HeapAllocator, IngestResult, UploadController};
use sluice_storage::ObjectStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Object storage backend (the SD card).
    pub storage: Arc<dyn ObjectStore>,
    /// The single-session upload controller.
    pub controller: Arc<UploadController>,
    /// Last-activity tracking, also the controller's platform hooks.
    pub activity: Arc<ActivityTracker>,
}

impl AppState {
    /// Create the application state and start the drain worker.
    ///
    /// Must be called from inside the tokio runtime.
    pub fn new(config: AppConfig, storage: Arc<dyn ObjectStore>) -> IngestResult<Self> {
        let activity = Arc::new(ActivityTracker::new());
        let controller = UploadController::with_parts(
            config.ingest.clone(),
            storage.clone(),
            activity.clone(),
            Arc::new(HeapAllocator),
        )?;

        Ok(Self {
            config: Arc::new(config),
            storage,
            controller: Arc::new(controller),
            activity,
        })
    }
}
