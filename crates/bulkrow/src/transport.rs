//! Transport seam between the batching engine and the remote service.
//!
//! The engine does not own an RPC stack. It hands closed batches (and
//! pass-through read-modify-write requests) to a [`MutationTransport`]
//! implementation, which is responsible for wire encoding, retries and
//! backoff. The contract the engine relies on:
//!
//! - `send_batch` issues exactly one batched call for the given entries and
//!   returns per-entry results keyed by **original submission index**,
//!   pre-ordered by that index.
//! - a wholesale failure (no per-entry result produced) is reported as the
//!   outer `Err`.
//! - `send_single` issues one unbatched call and returns the resulting row.

use async_trait::async_trait;

use crate::batch::MutationEntry;
use crate::error::BulkResult;
use crate::types::{ReadModifyWriteRow, RequestContext, Row};

/// Outcome of one entry within a batched call.
#[derive(Debug)]
pub struct EntryResult {
    /// Index of the entry in the original batch, in submission order.
    pub index: usize,

    /// Per-entry outcome. `Err` here affects only this entry's slot.
    pub outcome: BulkResult<()>,
}

impl EntryResult {
    /// Successful entry at `index`.
    pub fn ok(index: usize) -> Self {
        Self {
            index,
            outcome: Ok(()),
        }
    }

    /// Failed entry at `index`.
    pub fn err(index: usize, err: crate::error::BulkError) -> Self {
        Self {
            index,
            outcome: Err(err),
        }
    }
}

/// Remote call surface consumed by the engine.
///
/// Implementations are shared across tasks behind an `Arc`, so methods take
/// `&self` and must be internally synchronized.
#[async_trait]
pub trait MutationTransport: Send + Sync + 'static {
    /// Send all `entries` as one batched call, in their given order.
    ///
    /// # Errors
    /// A wholesale transport failure (deadline exceeded, unavailable, ...)
    /// that produced no per-entry result.
    async fn send_batch(
        &self,
        context: &RequestContext,
        entries: &[MutationEntry],
    ) -> BulkResult<Vec<EntryResult>>;

    /// Send one read-modify-write request outside of any batch.
    async fn send_single(
        &self,
        context: &RequestContext,
        request: &ReadModifyWriteRow,
    ) -> BulkResult<Row>;
}
