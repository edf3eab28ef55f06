//! Producer side of the ring.

use crate::error::{IngestError, IngestResult};
use crate::hooks::PlatformHooks;
use crate::session::SessionShared;
use sluice_core::{AbortReason, UploadSummary};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Result of a successfully handled chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// The bytes are in the ring; more chunks are expected.
    Buffered,
    /// The final chunk was written and the drain task closed the file.
    Completed(UploadSummary),
}

impl ChunkOutcome {
    pub fn summary(&self) -> Option<&UploadSummary> {
        match self {
            Self::Buffered => None,
            Self::Completed(summary) => Some(summary),
        }
    }
}

/// Copies inbound chunks into the session's slots.
///
/// Runs in the producer's task. The writer owns `write_index` and the fill
/// level of the slot it is filling; it touches a slot only while that
/// slot's `full` flag is clear.
pub struct IngestWriter {
    shared: Arc<SessionShared>,
    hooks: Arc<dyn PlatformHooks>,
    completion: Option<oneshot::Receiver<UploadSummary>>,
    write_index: usize,
    fill: usize,
    next_offset: u64,
    finished: bool,
    completed: bool,
}

impl IngestWriter {
    pub(crate) fn new(
        shared: Arc<SessionShared>,
        hooks: Arc<dyn PlatformHooks>,
        completion: oneshot::Receiver<UploadSummary>,
    ) -> Self {
        Self {
            shared,
            hooks,
            completion: Some(completion),
            write_index: 0,
            fill: 0,
            next_offset: 0,
            finished: false,
            completed: false,
        }
    }

    /// Offset the next chunk must start at.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Whether the final chunk has been accepted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether the drain task reported a clean finish.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Whether a chunk at `offset` would be accepted right now.
    pub fn accepts(&self, offset: u64) -> bool {
        !self.finished && offset == self.next_offset && !self.shared.signals.is_aborted()
    }

    /// Append `data` at `offset`.
    ///
    /// Suspends while the target slot is still waiting to be drained. On
    /// `is_final` the partially filled slot is handed over and the call
    /// waits until the drain task has closed the file (or the session was
    /// aborted).
    pub async fn write_chunk(
        &mut self,
        offset: u64,
        data: &[u8],
        is_final: bool,
    ) -> IngestResult<ChunkOutcome> {
        if self.finished {
            return Err(IngestError::SessionClosed);
        }
        if let Some(reason) = self.shared.signals.abort_reason() {
            return Err(IngestError::Aborted(reason));
        }
        if offset != self.next_offset {
            return Err(IngestError::UnexpectedOffset {
                expected: self.next_offset,
                actual: offset,
            });
        }

        self.hooks.touch_activity();

        let chunk_size = self.shared.pool.chunk_size();
        let mut remaining = data;
        while !remaining.is_empty() {
            if self.fill == 0 {
                self.wait_for_slot().await?;
            }

            let take = (chunk_size - self.fill).min(remaining.len());
            let slot = self.shared.pool.slot(self.write_index);
            if !slot.copy_in(self.fill, &remaining[..take]) {
                return Err(self.aborted());
            }
            self.fill += take;
            self.next_offset += take as u64;
            remaining = &remaining[take..];

            if self.fill == chunk_size {
                self.publish();
            }
        }

        if !is_final {
            return Ok(ChunkOutcome::Buffered);
        }

        self.finished = true;
        if self.fill > 0 {
            self.publish();
        }
        self.shared.signals.request_completion();

        let completion = self.completion.take().ok_or(IngestError::SessionClosed)?;
        match completion.await {
            Ok(summary) => {
                self.completed = true;
                Ok(ChunkOutcome::Completed(summary))
            }
            Err(_) => Err(self.aborted()),
        }
    }

    /// Wait until the slot at `write_index` has been drained.
    async fn wait_for_slot(&self) -> IngestResult<()> {
        let signals = &self.shared.signals;
        let slot = self.shared.pool.slot(self.write_index);
        loop {
            if let Some(reason) = signals.abort_reason() {
                return Err(IngestError::Aborted(reason));
            }
            if !slot.is_full() {
                return Ok(());
            }
            signals.freed.notified().await;
        }
    }

    fn publish(&mut self) {
        self.shared.pool.slot(self.write_index).publish(self.fill);
        self.shared.signals.filled.notify_one();
        self.write_index = self.shared.pool.next_index(self.write_index);
        self.fill = 0;
    }

    fn aborted(&self) -> IngestError {
        IngestError::Aborted(
            self.shared
                .signals
                .abort_reason()
                .unwrap_or(AbortReason::Disconnected),
        )
    }
}
