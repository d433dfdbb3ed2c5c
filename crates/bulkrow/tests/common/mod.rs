//! Shared in-memory transport for integration tests.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use bulkrow::{
    BulkResult, EntryResult, MutationEntry, MutationTransport, ReadModifyWriteRow, RequestContext,
    Row, RowCell, RowMutation,
};

/// Scripted transport: records every batched call, optionally blocks each
/// call on a gate, and replies from a script (or acks everything once the
/// script is exhausted).
pub struct TestTransport {
    /// Row keys of each batched call, in arrival order.
    batches: Mutex<Vec<Vec<Vec<u8>>>>,
    /// Scripted batch replies, consumed per call.
    replies: Mutex<VecDeque<BulkResult<Vec<EntryResult>>>>,
    /// When present, each batched call consumes one permit before replying.
    batch_gate: Option<Arc<Semaphore>>,
    /// When present, each single call consumes one permit before replying.
    single_gate: Option<Arc<Semaphore>>,
}

impl TestTransport {
    /// Transport that immediately acks every entry.
    pub fn acking() -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::new()),
            batch_gate: None,
            single_gate: None,
        })
    }

    /// Transport replying from `replies`, one element per batched call.
    pub fn scripted(replies: Vec<BulkResult<Vec<EntryResult>>>) -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(Vec::new()),
            replies: Mutex::new(replies.into()),
            batch_gate: None,
            single_gate: None,
        })
    }

    /// Transport whose batched calls block until `gate` receives permits.
    pub fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::new()),
            batch_gate: Some(gate),
            single_gate: None,
        })
    }

    /// Transport whose single-request calls block until `gate` receives
    /// permits; batched calls ack immediately.
    pub fn single_gated(gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::new()),
            batch_gate: None,
            single_gate: Some(gate),
        })
    }

    /// Number of batched calls issued so far.
    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    /// Row keys of batched call `i`, in entry order.
    pub fn batch_keys(&self, i: usize) -> Vec<Vec<u8>> {
        self.batches.lock()[i].clone()
    }
}

#[async_trait]
impl MutationTransport for TestTransport {
    async fn send_batch(
        &self,
        _context: &RequestContext,
        entries: &[MutationEntry],
    ) -> BulkResult<Vec<EntryResult>> {
        self.batches
            .lock()
            .push(entries.iter().map(|e| e.row_key().to_vec()).collect());

        if let Some(gate) = &self.batch_gate {
            gate.acquire().await.unwrap().forget();
        }

        let scripted = self.replies.lock().pop_front();
        match scripted {
            Some(reply) => reply,
            None => Ok((0..entries.len()).map(EntryResult::ok).collect()),
        }
    }

    async fn send_single(
        &self,
        _context: &RequestContext,
        request: &ReadModifyWriteRow,
    ) -> BulkResult<Row> {
        if let Some(gate) = &self.single_gate {
            gate.acquire().await.unwrap().forget();
        }

        Ok(Row::new(
            request.row_key().to_vec(),
            vec![RowCell {
                column: "cf:value".to_string(),
                value: b"post-mutation".to_vec(),
                timestamp_micros: 1,
            }],
        ))
    }
}

/// One-cell row mutation for `key`.
pub fn mutation(key: &str) -> RowMutation {
    RowMutation::new(key).set_cell("cf:c", b"v".to_vec())
}

/// One-cell row mutation with a payload of `len` bytes.
pub fn mutation_of_len(key: &str, len: usize) -> RowMutation {
    RowMutation::new(key).set_cell("cf:c", vec![0u8; len])
}

pub fn context() -> RequestContext {
    RequestContext::new("test-project", "test-instance", "test-profile")
}
