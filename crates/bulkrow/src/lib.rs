//! Client-side bulk mutation batching for distributed key-row stores.
//!
//! Applications submit individual row mutations; the engine transparently
//! groups them into larger batched remote calls to amortize per-call
//! overhead, tracks the outcome of each mutation within a batch, and hands
//! every caller a per-mutation future, hiding batching, flow control and
//! partial-failure handling.
//!
//! # Architecture
//!
//! - **[`BulkMutation`]**: public surface (`add`, `flush`, `send_unsent`,
//!   `is_flushed`, pass-through `read_modify_write`)
//! - **Batch assembler**: accumulates the open batch; closes it on count,
//!   byte-size, explicit-flush or staleness triggers
//! - **Flow controller**: weighted admission gate bounding in-flight
//!   entries and bytes; the producer backpressure mechanism
//! - **Batch dispatcher**: one batched call per closed batch, positional
//!   demultiplexing of per-entry results
//! - **[`MutationTransport`]**: the external RPC seam implementations plug
//!   into
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bulkrow::{BulkMutation, BulkMutationConfig, RequestContext, RowMutation};
//!
//! let bulk = BulkMutation::new(
//!     Arc::new(my_transport),
//!     RequestContext::new("project", "instance", "default"),
//!     BulkMutationConfig::default(),
//! )?;
//!
//! let outcome = bulk
//!     .add(RowMutation::new("row-1").set_cell("cf:name", b"alice".to_vec()))
//!     .await?;
//!
//! bulk.flush().await;
//! outcome.await?;
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod stats;
pub mod transport;
pub mod types;

mod bulk;

pub use bulk::BulkMutation;
pub use config::{BatchingConfig, BulkMutationConfig, FlowControlConfig};
pub use error::{BulkError, BulkResult, TransportErrorKind};
pub use stats::{BulkStats, BulkStatsSummary};
pub use transport::{EntryResult, MutationTransport};

// Value-object re-exports for the public API
pub use batch::{FlowControlToken, FlowController, MutationEntry, MutationFuture};
pub use types::{
    CellMutation, ReadModifyWriteRow, ReadModifyWriteRule, RequestContext, Row, RowCell,
    RowMutation,
};
