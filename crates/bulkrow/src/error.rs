//! Error type for the bulk mutation engine.
//!
//! # Error Categories
//!
//! | Category | Variants | Recovery Strategy |
//! |----------|----------|-------------------|
//! | Validation | InvalidArgument | Fix the mutation and resubmit |
//! | Per-entry | EntryFailed, IncompleteResponse | Resubmit the single mutation |
//! | Transport | Transport | Resubmit after the service recovers |
//! | Admission | FlowControlTimeout | Back off and resubmit |
//! | Lifecycle | ChannelClosed | Engine was shut down mid-flight |
//! | Configuration | ConfigError | Fix configuration |
//!
//! Every failure is surfaced through the caller-visible mutation future;
//! nothing in this crate is treated as process-fatal.

use thiserror::Error;

/// Coarse failure kind reported by the remote transport.
///
/// Mirrors the status classes a batched or single call can fail with
/// before any per-entry result is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The call exceeded its deadline.
    DeadlineExceeded,
    /// The service was unreachable or overloaded.
    Unavailable,
    /// Credentials were missing or rejected.
    Unauthenticated,
    /// Any other server-side failure.
    Internal,
}

impl TransportErrorKind {
    /// Returns the kind name as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::DeadlineExceeded => "deadline_exceeded",
            TransportErrorKind::Unavailable => "unavailable",
            TransportErrorKind::Unauthenticated => "unauthenticated",
            TransportErrorKind::Internal => "internal",
        }
    }
}

/// Error type for all bulk mutation engine failures.
///
/// All variants are `Clone` so a single wholesale failure cause can be
/// fanned out to every outcome slot in a batch.
#[derive(Debug, Clone, Error)]
pub enum BulkError {
    // === Validation Errors ===
    /// Malformed mutation rejected synchronously at `add`.
    /// No outcome slot is created and no batch state changes.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    // === Per-Entry Errors ===
    /// The server rejected this entry while sibling entries in the same
    /// batch were processed independently.
    #[error("mutation entry {index} failed: {message}")]
    EntryFailed { index: usize, message: String },

    /// The transport reported fewer per-entry results than entries sent.
    /// Unreported slots resolve with this so no entry is left pending.
    #[error("transport response missing result for entry {index}")]
    IncompleteResponse { index: usize },

    // === Transport Errors ===
    /// The batched (or single) call failed wholesale before producing any
    /// per-entry result. Every slot in the batch resolves with this cause.
    #[error("transport failure ({}): {message}", .kind.as_str())]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },

    // === Admission Errors ===
    /// Flow-control capacity could not be acquired within the configured
    /// maximum wait.
    #[error("flow control acquisition timed out after {waited_ms}ms")]
    FlowControlTimeout { waited_ms: u64 },

    // === Lifecycle Errors ===
    /// The outcome channel was dropped before a result was delivered.
    #[error("outcome channel closed before resolution")]
    ChannelClosed,

    // === Configuration Errors ===
    /// Configuration file invalid or a value out of range.
    #[error("configuration error: {message}")]
    ConfigError { message: String },

    /// Internal invariant violation (should not occur in normal operation).
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Result type alias for bulk mutation operations.
pub type BulkResult<T> = Result<T, BulkError>;
