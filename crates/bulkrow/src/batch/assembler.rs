//! Accumulates added mutations into the open batch and tracks in-flight
//! batches until they drain.
//!
//! The open batch is the one shared mutable structure in the engine. Append
//! and close-and-swap are serialized under a single mutex (never held
//! across an await) so an entry can neither land in a batch that was
//! already swapped out for dispatch nor be lost between the pre-close and
//! post-close batch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::batch::types::{MutationEntry, MutationFuture, PendingBatch};
use crate::config::BatchingConfig;

// ============================================================================
// IN-FLIGHT TRACKER
// ============================================================================

/// Counts closed batches that have not yet fully resolved.
///
/// A batch registers at close time (before admission), so `is_flushed`
/// observes it through its whole admission + dispatch lifetime. Waiters use
/// register-then-check so a drain notification between the check and the
/// await cannot be missed.
#[derive(Debug, Default)]
pub(crate) struct InFlightTracker {
    active: AtomicUsize,
    drained: Notify,
}

impl InFlightTracker {
    /// Register one closed batch; the guard deregisters on drop.
    pub(crate) fn register(self: &Arc<Self>) -> InFlightGuard {
        self.active.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            tracker: Arc::clone(self),
        }
    }

    /// Number of closed batches not yet fully resolved.
    #[inline]
    pub(crate) fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Suspend until no closed batch remains in flight.
    pub(crate) async fn drained(&self) {
        loop {
            let notified = self.drained.notified();
            if self.active.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// RAII registration of one in-flight batch.
///
/// Travels with the batch from close to final resolution; dropping it on
/// any exit path (demux done, admission timeout, task panic) keeps the
/// drain count accurate.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    tracker: Arc<InFlightTracker>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.tracker.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.tracker.drained.notify_waiters();
        }
    }
}

// ============================================================================
// BATCH ASSEMBLER
// ============================================================================

/// Owns the open batch and applies the close triggers.
#[derive(Debug)]
pub(crate) struct BatchAssembler {
    open: Mutex<PendingBatch>,
    config: BatchingConfig,
    in_flight: Arc<InFlightTracker>,
}

impl BatchAssembler {
    pub(crate) fn new(config: BatchingConfig) -> Self {
        Self {
            open: Mutex::new(PendingBatch::new()),
            config,
            in_flight: Arc::new(InFlightTracker::default()),
        }
    }

    /// Append an entry to the open batch.
    ///
    /// Returns the entry's caller-facing future and, when the append made
    /// the batch reach its count or byte limit, the closed batch (already
    /// registered as in-flight) ready for admission.
    pub(crate) fn push(
        &self,
        entry: MutationEntry,
    ) -> (MutationFuture, Option<(PendingBatch, InFlightGuard)>) {
        let mut open = self.open.lock();
        let future = open.push(entry);

        let closed = if open.len() >= self.config.max_batch_entries
            || open.total_bytes() >= self.config.max_batch_bytes
        {
            let batch = std::mem::take(&mut *open);
            debug!(
                batch_id = %batch.id(),
                entries = batch.len(),
                bytes = batch.total_bytes(),
                "open batch reached limit, closing"
            );
            Some((batch, self.in_flight.register()))
        } else {
            None
        };

        (future, closed)
    }

    /// Close and take the open batch if it holds any entries.
    ///
    /// Backs `send_unsent` and `flush`; a no-op when nothing is buffered.
    pub(crate) fn take_open(&self) -> Option<(PendingBatch, InFlightGuard)> {
        let mut open = self.open.lock();
        if open.is_empty() {
            return None;
        }
        let batch = std::mem::take(&mut *open);
        debug!(
            batch_id = %batch.id(),
            entries = batch.len(),
            bytes = batch.total_bytes(),
            "closing open batch on request"
        );
        Some((batch, self.in_flight.register()))
    }

    /// True iff the open batch holds at least one entry.
    pub(crate) fn has_buffered(&self) -> bool {
        !self.open.lock().is_empty()
    }

    /// True iff nothing is buffered and no closed batch is in flight.
    pub(crate) fn is_flushed(&self) -> bool {
        !self.has_buffered() && self.in_flight.active() == 0
    }

    /// Suspend until every in-flight batch has resolved.
    pub(crate) async fn drained(&self) {
        self.in_flight.drained().await;
    }

    pub(crate) fn in_flight(&self) -> &Arc<InFlightTracker> {
        &self.in_flight
    }
}
