//! Pending-entry registry: wire entries, outcome slots and batches.
//!
//! A [`PendingBatch`] is the ordered pairing of accepted [`MutationEntry`]s
//! with their [`OutcomeSlot`]s. The slot is the single-assignment bridge
//! between asynchronous batch completion and the caller-visible
//! [`MutationFuture`]: it resolves exactly once, with a success or a
//! failure cause, and consuming it enforces that at the type level.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::{BulkError, BulkResult};
use crate::types::{CellMutation, RowMutation};

// ============================================================================
// MUTATION ENTRY
// ============================================================================

/// One row mutation in wire-level form, as carried inside a batch.
///
/// Identified by its position within its batch; immutable once added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEntry {
    row_key: Vec<u8>,
    mutations: Vec<CellMutation>,
    byte_size: usize,
}

impl MutationEntry {
    /// Convert an application-facing mutation into a batch entry.
    ///
    /// # Errors
    /// `BulkError::InvalidArgument` if the mutation has no cell mutations.
    pub fn from_mutation(mutation: RowMutation) -> BulkResult<Self> {
        mutation.validate()?;
        let (row_key, mutations) = mutation.into_parts();
        let byte_size =
            row_key.len() + mutations.iter().map(CellMutation::byte_size).sum::<usize>();
        Ok(Self {
            row_key,
            mutations,
            byte_size,
        })
    }

    #[inline]
    pub fn row_key(&self) -> &[u8] {
        &self.row_key
    }

    #[inline]
    pub fn mutations(&self) -> &[CellMutation] {
        &self.mutations
    }

    /// Approximate serialized size, used for batch size triggers and
    /// flow-control weighting.
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }
}

// ============================================================================
// OUTCOME SLOT
// ============================================================================

/// Single-assignment result cell for one mutation entry.
///
/// Resolution consumes the slot, so a slot can never be resolved twice.
/// Dropping an unresolved slot closes the channel and the paired future
/// yields `BulkError::ChannelClosed`.
#[derive(Debug)]
pub struct OutcomeSlot {
    tx: oneshot::Sender<BulkResult<()>>,
}

impl OutcomeSlot {
    /// Create a slot and the caller-facing future it resolves.
    pub fn new() -> (Self, MutationFuture) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, MutationFuture { rx })
    }

    /// Resolve the slot with a success.
    pub fn resolve_ok(self) {
        // Ignore send errors (caller may have dropped the future)
        let _ = self.tx.send(Ok(()));
    }

    /// Resolve the slot with a failure cause.
    pub fn resolve_err(self, err: BulkError) {
        let _ = self.tx.send(Err(err));
    }
}

/// Caller-visible future for one added mutation.
///
/// Resolves when the entry's batch completes (or fails) remotely.
#[derive(Debug)]
pub struct MutationFuture {
    rx: oneshot::Receiver<BulkResult<()>>,
}

impl Future for MutationFuture {
    type Output = BulkResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|res| match res {
            Ok(outcome) => outcome,
            Err(_) => Err(BulkError::ChannelClosed),
        })
    }
}

// ============================================================================
// PENDING BATCH
// ============================================================================

/// Ordered entries plus their outcome slots, with aggregate counters.
///
/// # Lifecycle
///
/// 1. Created empty by the assembler
/// 2. Entries appended with `push()` (slot created per entry)
/// 3. Closed for dispatch (swapped out of the assembler; no more appends)
/// 4. Sent; responses demultiplexed positionally
/// 5. All slots resolved; batch discarded
#[derive(Debug)]
pub struct PendingBatch {
    id: Uuid,
    entries: Vec<MutationEntry>,
    slots: Vec<OutcomeSlot>,
    total_bytes: usize,
    opened_at: Instant,
}

impl PendingBatch {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            entries: Vec::new(),
            slots: Vec::new(),
            total_bytes: 0,
            opened_at: Instant::now(),
        }
    }

    /// Append an entry, creating its outcome slot, and return the paired
    /// caller-facing future. The slot index is the entry's position.
    pub fn push(&mut self, entry: MutationEntry) -> MutationFuture {
        let (slot, future) = OutcomeSlot::new();
        self.total_bytes += entry.byte_size();
        self.entries.push(entry);
        self.slots.push(slot);
        future
    }

    /// Batch identifier for log correlation.
    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cumulative approximate entry size.
    #[inline]
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Time since the batch was opened.
    #[inline]
    pub fn age(&self) -> std::time::Duration {
        self.opened_at.elapsed()
    }

    /// Resolve every slot with the same failure cause.
    ///
    /// Used when the whole batch fails before any per-entry result exists
    /// (wholesale transport failure, admission timeout).
    pub fn fail(self, err: BulkError) {
        for slot in self.slots {
            slot.resolve_err(err.clone());
        }
    }

    /// Split into entries and slots for dispatch. Index `i` of one vector
    /// corresponds to index `i` of the other.
    pub fn into_parts(self) -> (Uuid, Vec<MutationEntry>, Vec<OutcomeSlot>) {
        (self.id, self.entries, self.slots)
    }
}

impl Default for PendingBatch {
    fn default() -> Self {
        Self::new()
    }
}
