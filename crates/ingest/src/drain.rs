//! Storage drain: the consumer side of the ring.
//!
//! One [`DrainWorker`] task lives as long as its controller. It parks on a
//! job channel between sessions and runs [`drain_session`] for each one.
//! During a session it owns the destination upload and `read_index`, and it
//! is the only party that releases the session's slots.

use crate::error::{IngestError, IngestResult};
use crate::hooks::PlatformHooks;
use crate::session::{Lifecycle, SessionShared};
use sluice_core::{AbortReason, SessionOutcome, UploadSummary};
use sluice_storage::{ObjectStore, StreamingUpload};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// One session handed to the drain worker.
pub(crate) struct DrainJob {
    pub(crate) shared: Arc<SessionShared>,
    /// Granted exactly once, on a clean finish. Dropped on abort.
    pub(crate) completion: oneshot::Sender<UploadSummary>,
}

/// Everything a drain needs besides the session itself.
pub(crate) struct DrainContext {
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) hooks: Arc<dyn PlatformHooks>,
    pub(crate) lifecycle: Arc<Lifecycle>,
    pub(crate) stall_timeout: Duration,
}

/// Long-lived background task that drains one session at a time.
pub(crate) struct DrainWorker {
    jobs: mpsc::Sender<DrainJob>,
    task: JoinHandle<()>,
}

impl DrainWorker {
    pub(crate) fn spawn(ctx: DrainContext) -> Self {
        let (jobs, mut rx) = mpsc::channel::<DrainJob>(1);
        let task = tokio::spawn(async move {
            tracing::debug!(backend = ctx.store.backend_name(), "Drain worker started");
            while let Some(job) = rx.recv().await {
                drain_session(&ctx, job).await;
            }
            tracing::debug!("Drain worker stopped");
        });
        Self { jobs, task }
    }

    pub(crate) async fn submit(&self, job: DrainJob) -> IngestResult<()> {
        if self.task.is_finished() {
            return Err(IngestError::WorkerGone);
        }
        self.jobs
            .send(job)
            .await
            .map_err(|_| IngestError::WorkerGone)
    }
}

/// Drain one session from open to close.
pub(crate) async fn drain_session(ctx: &DrainContext, job: DrainJob) {
    let DrainJob { shared, completion } = job;
    ctx.hooks.pause_background();

    let mut drain = SessionDrain::open(ctx, shared).await;
    match drain.run(ctx).await {
        Ok(()) => drain.complete(ctx, completion).await,
        Err(reason) => drain.abort(ctx, reason).await,
    }
}

struct SessionDrain {
    shared: Arc<SessionShared>,
    upload: Option<Box<dyn StreamingUpload>>,
    read_index: usize,
    bytes_ok: u64,
    bytes_not_ok: u64,
    chunk_count: u64,
    started: Instant,
    started_at: OffsetDateTime,
}

impl SessionDrain {
    async fn open(ctx: &DrainContext, shared: Arc<SessionShared>) -> Self {
        let upload = match ctx.store.put_stream(&shared.path).await {
            Ok(upload) => Some(upload),
            Err(e) => {
                tracing::error!(
                    upload_id = %shared.id,
                    path = %shared.path,
                    error = %e,
                    "Failed to open destination, data will be counted as not written"
                );
                None
            }
        };

        Self {
            shared,
            upload,
            read_index: 0,
            bytes_ok: 0,
            bytes_not_ok: 0,
            chunk_count: 0,
            started: Instant::now(),
            started_at: OffsetDateTime::now_utc(),
        }
    }

    /// Drain until completion (`Ok`) or cancellation (`Err`).
    async fn run(&mut self, ctx: &DrainContext) -> Result<(), AbortReason> {
        let shared = self.shared.clone();
        let signals = &shared.signals;
        let mut last_progress = Instant::now();

        loop {
            if let Some(reason) = signals.abort_reason() {
                return Err(reason);
            }
            // Read before draining: every slot published ahead of the
            // request is then guaranteed to be seen below.
            let completing = signals.completion_requested();

            while shared.pool.slot(self.read_index).is_full() {
                if !self.drain_slot(ctx).await {
                    return Err(signals.abort_reason().unwrap_or(AbortReason::Disconnected));
                }
                last_progress = Instant::now();
                if let Some(reason) = signals.abort_reason() {
                    return Err(reason);
                }
            }

            if completing {
                return match signals.abort_reason() {
                    Some(reason) => Err(reason),
                    None => Ok(()),
                };
            }

            let deadline = last_progress + ctx.stall_timeout;
            if tokio::time::timeout_at(deadline, signals.filled.notified())
                .await
                .is_err()
            {
                if signals.request_abort(AbortReason::StallTimeout) {
                    tracing::warn!(
                        upload_id = %shared.id,
                        path = %shared.path,
                        stall_timeout_ms = ctx.stall_timeout.as_millis() as u64,
                        "No data received within stall timeout"
                    );
                }
                return Err(signals.abort_reason().unwrap_or(AbortReason::StallTimeout));
            }
        }
    }

    /// Write the slot at `read_index` and hand it back to the producer.
    ///
    /// Returns `false` if the slot memory is gone.
    async fn drain_slot(&mut self, ctx: &DrainContext) -> bool {
        let slot = self.shared.pool.slot(self.read_index);
        let Some((buf, len)) = slot.take_filled() else {
            return false;
        };

        let written = match self.upload.as_mut() {
            Some(upload) => match upload.write(&buf[..len]).await {
                Ok(written) => written,
                Err(e) => {
                    tracing::warn!(
                        upload_id = %self.shared.id,
                        error = %e,
                        "Storage write failed"
                    );
                    0
                }
            },
            None => 0,
        };

        if written == len {
            self.bytes_ok += len as u64;
        } else {
            self.bytes_not_ok += len as u64;
            if self.upload.is_some() {
                tracing::warn!(
                    upload_id = %self.shared.id,
                    requested = len,
                    written,
                    "Short write to storage"
                );
            }
        }
        self.chunk_count += 1;

        slot.mark_drained(buf);
        self.read_index = self.shared.pool.next_index(self.read_index);
        self.shared.signals.freed.notify_one();

        ctx.hooks.feed_watchdog();
        tokio::task::yield_now().await;
        true
    }

    async fn complete(mut self, ctx: &DrainContext, completion: oneshot::Sender<UploadSummary>) {
        let shared = self.shared.clone();

        if let Some(upload) = self.upload.take()
            && let Err(e) = upload.finish().await
        {
            tracing::error!(
                upload_id = %shared.id,
                path = %shared.path,
                error = %e,
                "Failed to close destination"
            );
            self.bytes_not_ok += self.bytes_ok;
            self.bytes_ok = 0;
        }

        let summary = UploadSummary {
            upload_id: shared.id,
            path: shared.path.clone(),
            bytes_ok: self.bytes_ok,
            bytes_not_ok: self.bytes_not_ok,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            chunk_count: self.chunk_count,
            started_at: self.started_at,
        };

        tracing::info!(
            upload_id = %summary.upload_id,
            path = %summary.path,
            bytes_ok = summary.bytes_ok,
            bytes_not_ok = summary.bytes_not_ok,
            elapsed_ms = summary.elapsed_ms,
            chunk_count = summary.chunk_count,
            "Upload complete"
        );
        tracing::debug!(
            upload_id = %summary.upload_id,
            total_bytes = summary.total_bytes(),
            throughput_bytes_per_ms = summary.throughput_bytes_per_ms(),
            "Upload throughput"
        );

        shared.pool.release();
        ctx.hooks.resume_background();
        ctx.lifecycle.finish(shared.id, SessionOutcome::Completed);

        if completion.send(summary).is_err() {
            tracing::debug!(upload_id = %shared.id, "Producer left before completion");
        }
    }

    async fn abort(mut self, ctx: &DrainContext, reason: AbortReason) {
        let shared = self.shared.clone();

        if let Some(upload) = self.upload.take()
            && let Err(e) = upload.abort().await
        {
            tracing::warn!(
                upload_id = %shared.id,
                error = %e,
                "Failed to discard partial destination"
            );
        }

        shared.pool.release();
        ctx.hooks.resume_background();

        tracing::error!(
            upload_id = %shared.id,
            path = %shared.path,
            reason = %reason,
            bytes_ok = self.bytes_ok,
            bytes_not_ok = self.bytes_not_ok,
            "Upload cancelled"
        );
        ctx.lifecycle.finish(shared.id, SessionOutcome::Aborted);
    }
}
