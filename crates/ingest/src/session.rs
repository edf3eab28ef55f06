//! Upload session control: one active session at a time.

use crate::alloc::{AllocPolicy, HeapAllocator, SlotAllocator};
use crate::drain::{DrainContext, DrainJob, DrainWorker};
use crate::error::{IngestError, IngestResult};
use crate::hooks::{NoopHooks, PlatformHooks};
use crate::pool::BufferPool;
use crate::signal::SessionSignals;
use crate::writer::{ChunkOutcome, IngestWriter};
use sluice_core::config::IngestConfig;
use sluice_core::{AbortReason, SessionOutcome, SessionState, SessionStatus, UploadId};
use sluice_storage::ObjectStore;
use std::sync::{Arc, Weak};
use tokio::sync::{oneshot, watch};

/// State shared by the producer, the drain task and disconnect hooks.
pub(crate) struct SessionShared {
    pub(crate) id: UploadId,
    pub(crate) path: String,
    pub(crate) pool: BufferPool,
    pub(crate) signals: SessionSignals,
}

impl SessionShared {
    fn new(id: UploadId, path: String, pool: BufferPool) -> Self {
        Self {
            id,
            path,
            pool,
            signals: SessionSignals::new(),
        }
    }
}

/// The controller's lifecycle state, observable through a watch channel.
///
/// Transitions are tagged with the session they belong to and only apply
/// while that session is active, so a late update from a finished session
/// never overwrites its successor. A session ends through
/// [`Lifecycle::finish`], which passes through the terminal state and
/// settles on `Idle`.
pub(crate) struct Lifecycle {
    tx: watch::Sender<SessionStatus>,
}

impl Lifecycle {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionStatus::default());
        Self { tx }
    }

    fn status(&self) -> SessionStatus {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.tx.subscribe()
    }

    /// Claim the controller for `id`, or report what is holding it.
    fn begin(&self, id: UploadId) -> IngestResult<()> {
        let mut busy = None;
        self.tx.send_if_modified(|status| {
            if status.state.is_active() {
                busy = Some(status.state);
                return false;
            }
            *status = SessionStatus {
                upload_id: Some(id),
                state: SessionState::Allocating,
                last_outcome: None,
            };
            true
        });

        match busy {
            Some(state) => Err(IngestError::SessionBusy { state }),
            None => Ok(()),
        }
    }

    pub(crate) fn transition(&self, id: UploadId, to: SessionState) -> bool {
        let changed = self.tx.send_if_modified(|status| {
            if status.upload_id != Some(id) || !status.state.is_active() || status.state == to {
                return false;
            }
            status.state = to;
            true
        });
        if changed {
            tracing::debug!(upload_id = %id, state = %to, "Upload session state changed");
        }
        changed
    }

    /// End session `id`: publish the terminal state, then return to `Idle`
    /// with the outcome recorded.
    pub(crate) fn finish(&self, id: UploadId, outcome: SessionOutcome) {
        let terminal = outcome.state();
        if !self.transition(id, terminal) {
            return;
        }
        self.tx.send_if_modified(|status| {
            if status.upload_id != Some(id) || status.state != terminal {
                return false;
            }
            status.state = SessionState::Idle;
            status.last_outcome = Some(outcome);
            true
        });
    }

    /// Whether session `id` still owns the controller.
    fn is_running(&self, id: UploadId) -> bool {
        let status = self.tx.borrow();
        status.upload_id == Some(id) && status.state.is_active()
    }
}

/// Accepts upload sessions and runs their drains on one background worker.
///
/// Must be created inside a tokio runtime: the drain worker is spawned once
/// here and parks between sessions.
pub struct UploadController {
    config: IngestConfig,
    policy: AllocPolicy,
    allocator: Arc<dyn SlotAllocator>,
    hooks: Arc<dyn PlatformHooks>,
    lifecycle: Arc<Lifecycle>,
    drain: DrainWorker,
}

impl UploadController {
    /// Create a controller with heap-backed slots and no platform hooks.
    pub fn new(config: IngestConfig, store: Arc<dyn ObjectStore>) -> IngestResult<Self> {
        Self::with_parts(
            config,
            store,
            Arc::new(NoopHooks),
            Arc::new(HeapAllocator),
        )
    }

    /// Create a controller with explicit platform hooks and slot allocator.
    pub fn with_parts(
        config: IngestConfig,
        store: Arc<dyn ObjectStore>,
        hooks: Arc<dyn PlatformHooks>,
        allocator: Arc<dyn SlotAllocator>,
    ) -> IngestResult<Self> {
        config
            .validate()
            .map_err(sluice_core::Error::InvalidConfig)?;

        let lifecycle = Arc::new(Lifecycle::new());
        let drain = DrainWorker::spawn(DrainContext {
            store,
            hooks: hooks.clone(),
            lifecycle: lifecycle.clone(),
            stall_timeout: config.stall_timeout(),
        });

        Ok(Self {
            policy: AllocPolicy::from(&config),
            config,
            allocator,
            hooks,
            lifecycle,
            drain,
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Current lifecycle snapshot.
    pub fn status(&self) -> SessionStatus {
        self.lifecycle.status()
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.status().state
    }

    /// Watch lifecycle changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.lifecycle.subscribe()
    }

    /// Start a session writing to `path`.
    ///
    /// Fails with [`IngestError::SessionBusy`] while another session is
    /// active and with [`IngestError::OutOfMemory`] when no slot size fits;
    /// in both cases nothing is handed to the drain worker.
    pub async fn start_session(&self, path: impl Into<String>) -> IngestResult<UploadSession> {
        let path = path.into();
        let id = UploadId::new();
        self.lifecycle.begin(id)?;

        let pool = match BufferPool::acquire(self.allocator.clone(), &self.policy) {
            Ok(pool) => pool,
            Err(err) => {
                tracing::error!(
                    upload_id = %id,
                    path = %path,
                    error = %err,
                    "Failed to allocate upload slots"
                );
                self.lifecycle.transition(id, SessionState::Idle);
                return Err(err);
            }
        };
        let chunk_size = pool.chunk_size();

        let shared = Arc::new(SessionShared::new(id, path, pool));
        let (completion_tx, completion_rx) = oneshot::channel();
        let job = DrainJob {
            shared: shared.clone(),
            completion: completion_tx,
        };
        if self.drain.submit(job).await.is_err() {
            tracing::error!(upload_id = %id, "Drain worker is gone, rejecting upload");
            self.lifecycle.finish(id, SessionOutcome::Aborted);
            return Err(IngestError::WorkerGone);
        }

        self.lifecycle.transition(id, SessionState::Streaming);
        tracing::info!(
            upload_id = %id,
            path = %shared.path,
            chunk_size,
            buffer_count = shared.pool.len(),
            "Upload session started"
        );

        Ok(UploadSession {
            writer: IngestWriter::new(shared.clone(), self.hooks.clone(), completion_rx),
            lifecycle: self.lifecycle.clone(),
            shared,
        })
    }
}

/// Producer-side handle for one upload session.
///
/// Dropping the handle before the final chunk completed cancels the
/// session, as if the client had disconnected.
pub struct UploadSession {
    writer: IngestWriter,
    lifecycle: Arc<Lifecycle>,
    shared: Arc<SessionShared>,
}

impl UploadSession {
    pub fn id(&self) -> UploadId {
        self.shared.id
    }

    /// Destination path the drain task writes to.
    pub fn path(&self) -> &str {
        &self.shared.path
    }

    /// Actual slot size after allocation.
    pub fn chunk_size(&self) -> usize {
        self.shared.pool.chunk_size()
    }

    /// Offset the next chunk must start at.
    pub fn next_offset(&self) -> u64 {
        self.writer.next_offset()
    }

    /// Hand a chunk to the ingest writer.
    ///
    /// A final chunk returns only after the drain task has closed the file;
    /// if the session is cancelled in the meantime the call fails with
    /// [`IngestError::Aborted`].
    pub async fn handle_chunk(
        &mut self,
        offset: u64,
        data: &[u8],
        is_final: bool,
    ) -> IngestResult<ChunkOutcome> {
        if is_final && self.writer.accepts(offset) {
            self.lifecycle.transition(self.shared.id, SessionState::Finalizing);
        }
        self.writer.write_chunk(offset, data, is_final).await
    }

    /// A hook the network layer can fire from anywhere when the connection
    /// drops.
    pub fn disconnect_hook(&self) -> DisconnectHook {
        DisconnectHook {
            shared: Arc::downgrade(&self.shared),
            lifecycle: self.lifecycle.clone(),
        }
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        if !self.writer.is_completed() {
            self.disconnect_hook().disconnect();
        }
    }
}

/// Cancels a session from outside the producer task.
#[derive(Clone)]
pub struct DisconnectHook {
    shared: Weak<SessionShared>,
    lifecycle: Arc<Lifecycle>,
}

impl DisconnectHook {
    /// Cancel the session. Returns `false` if it had already ended or been
    /// cancelled.
    pub fn disconnect(&self) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        if !self.lifecycle.is_running(shared.id) {
            return false;
        }
        let first = shared.signals.request_abort(AbortReason::Disconnected);
        if first {
            tracing::info!(
                upload_id = %shared.id,
                path = %shared.path,
                "Client disconnected, cancelling upload"
            );
        }
        first
    }
}
