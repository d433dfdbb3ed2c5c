//! Turns closed batches into batched remote calls and demultiplexes the
//! responses back to each entry's outcome slot.
//!
//! Partial failure policy: entry outcomes are independent. A wholesale
//! transport failure (no per-entry result produced) fans the same cause out
//! to every slot. The dispatcher never retries and assumes the transport
//! returns results pre-ordered by original index.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::batch::assembler::InFlightGuard;
use crate::batch::flow::{FlowControlToken, FlowController};
use crate::batch::types::PendingBatch;
use crate::error::{BulkError, BulkResult};
use crate::stats::BulkStats;
use crate::transport::MutationTransport;
use crate::types::RequestContext;

// ============================================================================
// BATCH DISPATCHER
// ============================================================================

/// Shared dispatch state; cheap to clone into spawned batch tasks.
#[derive(Clone)]
pub(crate) struct BatchDispatcher {
    transport: Arc<dyn MutationTransport>,
    context: Arc<RequestContext>,
    flow: Arc<FlowController>,
    stats: Arc<BulkStats>,
}

impl BatchDispatcher {
    pub(crate) fn new(
        transport: Arc<dyn MutationTransport>,
        context: Arc<RequestContext>,
        flow: Arc<FlowController>,
        stats: Arc<BulkStats>,
    ) -> Self {
        Self {
            transport,
            context,
            flow,
            stats,
        }
    }

    /// Admit a closed batch through flow control, then launch its remote
    /// call on a detached task.
    ///
    /// Suspends the caller until capacity is reserved (the producer
    /// backpressure point) but never for the remote call itself.
    /// An admission timeout resolves every slot in the batch with
    /// `FlowControlTimeout`.
    pub(crate) async fn admit_and_send(&self, batch: PendingBatch, guard: InFlightGuard) {
        let token = match self.flow.acquire(batch.len(), batch.total_bytes()).await {
            Ok(token) => token,
            Err(err) => {
                warn!(batch_id = %batch.id(), error = %err, "batch admission failed");
                self.stats.record_batch_failure();
                for _ in 0..batch.len() {
                    self.stats.record_completion(false);
                }
                batch.fail(err);
                drop(guard);
                return;
            }
        };

        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.run_batch(batch, token, guard).await;
        });
    }

    /// Admission and dispatch on a detached task; never suspends the
    /// caller. Backs `send_unsent` and the auto-flush worker.
    pub(crate) fn spawn_admit(&self, batch: PendingBatch, guard: InFlightGuard) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.admit_and_send(batch, guard).await;
        });
    }

    /// Issue the batched call and resolve every slot exactly once.
    async fn run_batch(self, batch: PendingBatch, mut token: FlowControlToken, guard: InFlightGuard) {
        let total_bytes = batch.total_bytes();
        let (batch_id, entries, slots) = batch.into_parts();
        let entry_count = entries.len();

        debug!(batch_id = %batch_id, entries = entry_count, bytes = total_bytes, "sending batch");
        self.stats.record_batch_sent(entry_count, total_bytes);

        match self.transport.send_batch(&self.context, &entries).await {
            Ok(results) => {
                // Demultiplex positionally: result index i resolves slot i.
                let mut outcomes: Vec<Option<BulkResult<()>>> = Vec::with_capacity(entry_count);
                outcomes.resize_with(entry_count, || None);
                for result in results {
                    if result.index >= entry_count {
                        warn!(
                            batch_id = %batch_id,
                            index = result.index,
                            "transport reported result for unknown entry index"
                        );
                        continue;
                    }
                    if outcomes[result.index].is_some() {
                        warn!(
                            batch_id = %batch_id,
                            index = result.index,
                            "transport reported duplicate result for entry index"
                        );
                        continue;
                    }
                    outcomes[result.index] = Some(result.outcome);
                }

                for (index, (slot, outcome)) in slots.into_iter().zip(outcomes).enumerate() {
                    let outcome =
                        outcome.unwrap_or(Err(BulkError::IncompleteResponse { index }));
                    self.stats.record_completion(outcome.is_ok());
                    match outcome {
                        Ok(()) => slot.resolve_ok(),
                        Err(err) => {
                            trace!(batch_id = %batch_id, index, error = %err, "entry failed");
                            slot.resolve_err(err);
                        }
                    }
                    // Capacity recovers per entry, not per batch.
                    token.release_entry(entries[index].byte_size());
                }
                debug!(batch_id = %batch_id, "batch resolved");
            }
            Err(err) => {
                warn!(batch_id = %batch_id, error = %err, "batch transport failure");
                self.stats.record_batch_failure();
                for slot in slots {
                    self.stats.record_completion(false);
                    slot.resolve_err(err.clone());
                }
                // Dropping the token returns the whole reservation.
            }
        }

        drop(guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::assembler::InFlightTracker;
    use crate::batch::types::{MutationEntry, MutationFuture};
    use crate::config::FlowControlConfig;
    use crate::error::TransportErrorKind;
    use crate::transport::EntryResult;
    use crate::types::{ReadModifyWriteRow, Row, RowMutation};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Transport whose batch replies are scripted per call.
    struct ScriptedTransport {
        replies: parking_lot::Mutex<Vec<BulkResult<Vec<EntryResult>>>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<BulkResult<Vec<EntryResult>>>) -> Arc<Self> {
            Arc::new(Self {
                replies: parking_lot::Mutex::new(replies),
            })
        }
    }

    #[async_trait]
    impl MutationTransport for ScriptedTransport {
        async fn send_batch(
            &self,
            _context: &RequestContext,
            _entries: &[MutationEntry],
        ) -> BulkResult<Vec<EntryResult>> {
            self.replies.lock().remove(0)
        }

        async fn send_single(
            &self,
            _context: &RequestContext,
            _request: &ReadModifyWriteRow,
        ) -> BulkResult<Row> {
            unimplemented!("dispatcher tests never hit the single-request path")
        }
    }

    fn context() -> Arc<RequestContext> {
        Arc::new(RequestContext::new("p", "i", "ap"))
    }

    fn flow(max_entries: usize) -> Arc<FlowController> {
        Arc::new(FlowController::new(&FlowControlConfig {
            max_in_flight_entries: max_entries,
            max_in_flight_bytes: 1024 * 1024,
            acquire_timeout_ms: None,
        }))
    }

    fn batch_of(keys: &[&str]) -> (PendingBatch, Vec<MutationFuture>) {
        let mut batch = PendingBatch::new();
        let futures = keys
            .iter()
            .map(|key| {
                batch.push(
                    MutationEntry::from_mutation(
                        RowMutation::new(*key).set_cell("cf:c", b"v".to_vec()),
                    )
                    .unwrap(),
                )
            })
            .collect();
        (batch, futures)
    }

    fn dispatcher(
        transport: Arc<dyn MutationTransport>,
        flow: Arc<FlowController>,
    ) -> (BatchDispatcher, Arc<BulkStats>) {
        let stats = Arc::new(BulkStats::default());
        (
            BatchDispatcher::new(transport, context(), flow, Arc::clone(&stats)),
            stats,
        )
    }

    // ============================================================
    // DEMULTIPLEXING TESTS
    // ============================================================

    #[tokio::test]
    async fn test_positional_demux_mixed_outcomes() {
        let transport = ScriptedTransport::new(vec![Ok(vec![
            EntryResult::ok(0),
            EntryResult::err(
                1,
                BulkError::EntryFailed {
                    index: 1,
                    message: "rejected".to_string(),
                },
            ),
            EntryResult::ok(2),
        ])]);
        let tracker = Arc::new(InFlightTracker::default());
        let (batch, futures) = batch_of(&["a", "b", "c"]);
        let guard = tracker.register();
        let (dispatcher, stats) = dispatcher(transport, flow(100));

        dispatcher.admit_and_send(batch, guard).await;

        let mut futures = futures.into_iter();
        assert!(futures.next().unwrap().await.is_ok());
        let err = futures.next().unwrap().await.unwrap_err();
        assert!(matches!(err, BulkError::EntryFailed { index: 1, .. }));
        assert!(futures.next().unwrap().await.is_ok());

        tracker.drained().await;
        let summary = stats.summary();
        assert_eq!(summary.batches_sent, 1);
        assert_eq!(summary.entries_succeeded, 2);
        assert_eq!(summary.entries_failed, 1);
    }

    #[tokio::test]
    async fn test_wholesale_failure_fans_out_same_cause() {
        let transport = ScriptedTransport::new(vec![Err(BulkError::Transport {
            kind: TransportErrorKind::DeadlineExceeded,
            message: "deadline".to_string(),
        })]);
        let tracker = Arc::new(InFlightTracker::default());
        let (batch, futures) = batch_of(&["a", "b", "c"]);
        let guard = tracker.register();
        let (dispatcher, stats) = dispatcher(transport, flow(100));

        dispatcher.admit_and_send(batch, guard).await;

        for future in futures {
            let err = future.await.unwrap_err();
            assert!(matches!(
                err,
                BulkError::Transport {
                    kind: TransportErrorKind::DeadlineExceeded,
                    ..
                }
            ));
        }

        tracker.drained().await;
        assert_eq!(stats.summary().batch_failures, 1);
        assert_eq!(stats.summary().entries_failed, 3);
    }

    #[tokio::test]
    async fn test_missing_result_resolves_incomplete() {
        // Transport reports only entries 0 and 2
        let transport = ScriptedTransport::new(vec![Ok(vec![
            EntryResult::ok(0),
            EntryResult::ok(2),
        ])]);
        let tracker = Arc::new(InFlightTracker::default());
        let (batch, futures) = batch_of(&["a", "b", "c"]);
        let guard = tracker.register();
        let (dispatcher, _stats) = dispatcher(transport, flow(100));

        dispatcher.admit_and_send(batch, guard).await;

        let mut futures = futures.into_iter();
        assert!(futures.next().unwrap().await.is_ok());
        let err = futures.next().unwrap().await.unwrap_err();
        assert!(matches!(err, BulkError::IncompleteResponse { index: 1 }));
        assert!(futures.next().unwrap().await.is_ok());
    }

    #[tokio::test]
    async fn test_out_of_range_and_duplicate_indexes_ignored() {
        let transport = ScriptedTransport::new(vec![Ok(vec![
            EntryResult::ok(0),
            EntryResult::err(
                0,
                BulkError::EntryFailed {
                    index: 0,
                    message: "duplicate, must be ignored".to_string(),
                },
            ),
            EntryResult::ok(9),
        ])]);
        let tracker = Arc::new(InFlightTracker::default());
        let (batch, futures) = batch_of(&["a"]);
        let guard = tracker.register();
        let (dispatcher, _stats) = dispatcher(transport, flow(100));

        dispatcher.admit_and_send(batch, guard).await;

        // First report wins; the duplicate failure and the out-of-range
        // index are both discarded.
        for future in futures {
            assert!(future.await.is_ok());
        }
    }

    // ============================================================
    // ADMISSION TESTS
    // ============================================================

    #[tokio::test]
    async fn test_admission_timeout_fails_all_slots() {
        let flow = Arc::new(FlowController::new(&FlowControlConfig {
            max_in_flight_entries: 1,
            max_in_flight_bytes: 1024,
            acquire_timeout_ms: Some(20),
        }));
        let _held = flow.acquire(1, 10).await.unwrap();

        let transport = ScriptedTransport::new(vec![]);
        let tracker = Arc::new(InFlightTracker::default());
        let (batch, futures) = batch_of(&["a", "b"]);
        let guard = tracker.register();
        let (dispatcher, stats) = dispatcher(transport, flow);

        dispatcher.admit_and_send(batch, guard).await;

        for future in futures {
            let err = future.await.unwrap_err();
            assert!(matches!(err, BulkError::FlowControlTimeout { .. }));
        }
        assert_eq!(tracker.active(), 0);
        assert_eq!(stats.summary().batch_failures, 1);
    }

    #[tokio::test]
    async fn test_capacity_returned_after_batch_resolves() {
        let transport = ScriptedTransport::new(vec![Ok(vec![EntryResult::ok(0)])]);
        let flow = flow(4);
        let tracker = Arc::new(InFlightTracker::default());
        let (batch, futures) = batch_of(&["a"]);
        let guard = tracker.register();
        let (dispatcher, _stats) = dispatcher(transport, Arc::clone(&flow));

        dispatcher.admit_and_send(batch, guard).await;
        for future in futures {
            future.await.unwrap();
        }
        timeout(Duration::from_millis(200), tracker.drained())
            .await
            .unwrap();

        assert_eq!(flow.available_entries(), 4);
    }
}
