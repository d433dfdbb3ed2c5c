//! Public bulk mutation surface.
//!
//! [`BulkMutation`] composes the assembler, flow controller and dispatcher
//! behind a handle that is safe to share across tasks. Read-modify-write
//! requests bypass all of it and go straight to the transport's
//! single-request path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::batch::{BatchAssembler, BatchDispatcher, FlowController, MutationEntry, MutationFuture};
use crate::config::BulkMutationConfig;
use crate::error::BulkResult;
use crate::stats::{BulkStats, BulkStatsSummary};
use crate::transport::MutationTransport;
use crate::types::{ReadModifyWriteRow, RequestContext, Row, RowMutation};

// ============================================================================
// BULK MUTATION FACADE
// ============================================================================

/// Client-side bulk mutation batcher for a key-row storage service.
///
/// Accepts individual row mutations, groups them into batched remote calls,
/// and resolves one future per mutation with its individual outcome.
///
/// # Lifecycle
/// 1. Create with [`new`](Self::new), which starts the auto-flush task if an
///    interval is configured
/// 2. Submit mutations with [`add`](Self::add); force dispatch with
///    [`flush`](Self::flush) / [`send_unsent`](Self::send_unsent)
/// 3. [`shutdown`](Self::shutdown): sends unsent entries and waits for
///    in-flight batches
///
/// # Thread Safety
/// All operations take `&self` and are safe from multiple concurrent
/// callers; share the instance behind an `Arc`.
pub struct BulkMutation {
    /// Open-batch accumulation and in-flight tracking.
    assembler: Arc<BatchAssembler>,

    /// Admission + remote call + demux.
    dispatcher: BatchDispatcher,

    /// Single-request pass-through path.
    transport: Arc<dyn MutationTransport>,

    /// Addressing triple attached to every outbound call.
    context: Arc<RequestContext>,

    /// Validated configuration.
    config: BulkMutationConfig,

    /// Statistics.
    stats: Arc<BulkStats>,

    /// Auto-flush task handle, when an interval is configured.
    autoflush_handle: Option<JoinHandle<()>>,

    /// Shutdown signal for the auto-flush task.
    shutdown_notify: Arc<Notify>,

    /// Running state.
    is_running: Arc<AtomicBool>,
}

impl BulkMutation {
    /// Create a bulk mutation engine over `transport` addressed by `context`.
    ///
    /// Must be called within a tokio runtime when
    /// `config.batching.autoflush_interval_ms` is set, since that spawns the
    /// auto-flush task.
    ///
    /// # Errors
    /// * `BulkError::ConfigError` if `config` is invalid
    pub fn new(
        transport: Arc<dyn MutationTransport>,
        context: RequestContext,
        config: BulkMutationConfig,
    ) -> BulkResult<Self> {
        config.validate()?;

        let context = Arc::new(context);
        let stats = Arc::new(BulkStats::default());
        let flow = Arc::new(FlowController::new(&config.flow));
        let assembler = Arc::new(BatchAssembler::new(config.batching.clone()));
        let dispatcher = BatchDispatcher::new(
            Arc::clone(&transport),
            Arc::clone(&context),
            flow,
            Arc::clone(&stats),
        );

        let shutdown_notify = Arc::new(Notify::new());
        let is_running = Arc::new(AtomicBool::new(true));

        let autoflush_handle = config.batching.autoflush_interval().map(|period| {
            let worker_assembler = Arc::clone(&assembler);
            let worker_dispatcher = dispatcher.clone();
            let worker_shutdown = Arc::clone(&shutdown_notify);
            let worker_running = Arc::clone(&is_running);
            tokio::spawn(async move {
                autoflush_loop(
                    worker_assembler,
                    worker_dispatcher,
                    worker_shutdown,
                    worker_running,
                    period,
                )
                .await;
            })
        });

        Ok(Self {
            assembler,
            dispatcher,
            transport,
            context,
            config,
            stats,
            autoflush_handle,
            shutdown_notify,
            is_running,
        })
    }

    // ========================================================================
    // MUTATION OPERATIONS
    // ========================================================================

    /// Submit one row mutation for batched delivery.
    ///
    /// Returns a future resolving with the mutation's individual outcome
    /// once its batch completes remotely. The call itself never waits for
    /// remote completion; it suspends only when the append closed the batch
    /// and flow-control capacity has to free up first (backpressure).
    ///
    /// # Errors
    /// * `BulkError::InvalidArgument`, synchronously, for a mutation with
    ///   no cell mutations. No outcome slot is created and no batch state
    ///   changes.
    pub async fn add(&self, mutation: RowMutation) -> BulkResult<MutationFuture> {
        let entry = MutationEntry::from_mutation(mutation)?;
        self.stats.record_entry_added();

        let (future, closed) = self.assembler.push(entry);
        if let Some((batch, guard)) = closed {
            self.dispatcher.admit_and_send(batch, guard).await;
        }
        Ok(future)
    }

    /// Dispatch the open batch (even if not full) and wait until it and all
    /// prior in-flight batches have resolved.
    ///
    /// Safe to call concurrently with ongoing `add`s; entries added after
    /// `flush` begins are not guaranteed to be included in the flushed set.
    /// The wait is unbounded; impose an external timeout if needed.
    pub async fn flush(&self) {
        if let Some((batch, guard)) = self.assembler.take_open() {
            self.dispatcher.admit_and_send(batch, guard).await;
        }
        self.assembler.drained().await;
    }

    /// Dispatch the open batch (if non-empty) without waiting for anything.
    ///
    /// Admission proceeds on a background task, so this never suspends the
    /// caller.
    pub fn send_unsent(&self) {
        if let Some((batch, guard)) = self.assembler.take_open() {
            self.dispatcher.spawn_admit(batch, guard);
        }
    }

    /// True iff no buffered (unsent) entries exist and no in-flight batch
    /// awaits resolution.
    pub fn is_flushed(&self) -> bool {
        self.assembler.is_flushed()
    }

    /// Send a read-modify-write request on the single-request path.
    ///
    /// Never batched: does not touch the open batch, flow control, or
    /// `flush` accounting.
    pub async fn read_modify_write(&self, request: ReadModifyWriteRow) -> BulkResult<Row> {
        self.transport.send_single(&self.context, &request).await
    }

    // ========================================================================
    // QUERY METHODS
    // ========================================================================

    /// Snapshot of engine statistics.
    pub fn stats(&self) -> BulkStatsSummary {
        self.stats.summary()
    }

    /// The engine's configuration.
    #[inline]
    pub fn config(&self) -> &BulkMutationConfig {
        &self.config
    }

    /// The addressing triple attached to outbound calls.
    #[inline]
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// False once `shutdown` has begun.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    // ========================================================================
    // LIFECYCLE METHODS
    // ========================================================================

    /// Graceful shutdown: stop the auto-flush task, send unsent entries and
    /// wait for every in-flight batch, so no accepted mutation is dropped
    /// unresolved.
    pub async fn shutdown(&mut self) {
        self.is_running.store(false, Ordering::Relaxed);
        self.shutdown_notify.notify_one();

        if let Some(handle) = self.autoflush_handle.take() {
            let _ = handle.await;
        }

        self.flush().await;
    }
}

impl Drop for BulkMutation {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::Relaxed);
        self.shutdown_notify.notify_one();

        // Cannot await in Drop; abort so the task does not outlive the engine.
        if let Some(handle) = self.autoflush_handle.take() {
            handle.abort();
            debug!("BulkMutation: auto-flush task aborted on drop");
        }
    }
}

// ============================================================================
// AUTO-FLUSH WORKER
// ============================================================================

/// Periodically sends the open batch so buffered mutations cannot go stale.
async fn autoflush_loop(
    assembler: Arc<BatchAssembler>,
    dispatcher: BatchDispatcher,
    shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                if let Some((batch, guard)) = assembler.take_open() {
                    debug!(batch_id = %batch.id(), entries = batch.len(), "auto-flush sending stale batch");
                    dispatcher.spawn_admit(batch, guard);
                }
            }
            _ = shutdown.notified() => break,
        }
    }
    debug!("auto-flush task stopped");
}
