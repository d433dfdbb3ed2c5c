//! Batching engine: entry registry, assembler, flow control, dispatcher.
//!
//! # Architecture
//!
//! ```text
//! Caller              BatchAssembler        FlowController      BatchDispatcher
//!   |                      |                      |                   |
//!   |---add(mutation)-->  push()                  |                   |
//!   |<--MutationFuture-----|                      |                   |
//!   |                 close on count/byte         |                   |
//!   |                 trigger or flush            |                   |
//!   |                      |----PendingBatch--> acquire()             |
//!   |                      |                      |---token+batch---> |
//!   |                      |                      |              send_batch()
//!   |                      |                      |<--release/entry-- |
//!   |<------------------per-entry outcome via OutcomeSlot------------ |
//! ```
//!
//! The assembler owns the open batch; a closed batch is admitted through
//! the flow controller and then exclusively owned by the dispatcher until
//! every outcome slot has resolved.

mod assembler;
mod dispatcher;
mod flow;
mod types;

pub use flow::{FlowControlToken, FlowController};
pub use types::{MutationEntry, MutationFuture, OutcomeSlot, PendingBatch};

pub(crate) use assembler::{BatchAssembler, InFlightGuard, InFlightTracker};
pub(crate) use dispatcher::BatchDispatcher;
