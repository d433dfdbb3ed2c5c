//! Caller-facing value objects for row mutations and read-modify-write.
//!
//! These are the application-level types submitted to [`BulkMutation`]
//! (`crate::BulkMutation`). The engine converts a [`RowMutation`] into a
//! wire-level entry (`crate::batch::MutationEntry`) at `add` time; the
//! conversion rejects mutations with an empty cell list.

use crate::error::{BulkError, BulkResult};

// ============================================================================
// REQUEST CONTEXT
// ============================================================================

/// Addressing triple attached to every outbound call.
///
/// Immutable once constructed; one per engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    project_id: String,
    instance_id: String,
    app_profile_id: String,
}

impl RequestContext {
    /// Create a request context for a (project, instance, app profile) triple.
    pub fn new(
        project_id: impl Into<String>,
        instance_id: impl Into<String>,
        app_profile_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            instance_id: instance_id.into(),
            app_profile_id: app_profile_id.into(),
        }
    }

    #[inline]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    #[inline]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    #[inline]
    pub fn app_profile_id(&self) -> &str {
        &self.app_profile_id
    }
}

// ============================================================================
// CELL MUTATION
// ============================================================================

/// One cell-level change within a row mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellMutation {
    /// Column the cell lives in.
    pub column: String,

    /// Cell value to write.
    pub value: Vec<u8>,

    /// Explicit cell timestamp in microseconds.
    /// `None` lets the server assign the write time.
    pub timestamp_micros: Option<i64>,
}

impl CellMutation {
    /// Approximate serialized size, used for batch size triggers and
    /// flow-control weighting.
    pub(crate) fn byte_size(&self) -> usize {
        self.column.len() + self.value.len() + 8
    }
}

// ============================================================================
// ROW MUTATION
// ============================================================================

/// A caller-submitted mutation of a single row.
///
/// Built with the fluent setters and passed to `BulkMutation::add`.
/// Immutable once added to a batch.
///
/// # Example
///
/// ```rust
/// use bulkrow::RowMutation;
///
/// let mutation = RowMutation::new("row-0001")
///     .set_cell("cf:name", b"alice".to_vec())
///     .set_cell_at("cf:seen", b"1".to_vec(), 1_700_000_000_000_000);
/// assert_eq!(mutation.mutations().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMutation {
    row_key: Vec<u8>,
    mutations: Vec<CellMutation>,
}

impl RowMutation {
    /// Start a mutation of the row identified by `row_key`.
    pub fn new(row_key: impl Into<Vec<u8>>) -> Self {
        Self {
            row_key: row_key.into(),
            mutations: Vec::new(),
        }
    }

    /// Append a cell write with a server-assigned timestamp.
    #[must_use]
    pub fn set_cell(mut self, column: impl Into<String>, value: Vec<u8>) -> Self {
        self.mutations.push(CellMutation {
            column: column.into(),
            value,
            timestamp_micros: None,
        });
        self
    }

    /// Append a cell write with an explicit timestamp in microseconds.
    #[must_use]
    pub fn set_cell_at(
        mut self,
        column: impl Into<String>,
        value: Vec<u8>,
        timestamp_micros: i64,
    ) -> Self {
        self.mutations.push(CellMutation {
            column: column.into(),
            value,
            timestamp_micros: Some(timestamp_micros),
        });
        self
    }

    #[inline]
    pub fn row_key(&self) -> &[u8] {
        &self.row_key
    }

    #[inline]
    pub fn mutations(&self) -> &[CellMutation] {
        &self.mutations
    }

    /// Validate that the mutation carries at least one cell mutation.
    ///
    /// # Errors
    /// `BulkError::InvalidArgument` for an empty cell list. This is the
    /// synchronous rejection path of `add`: no outcome slot exists yet and
    /// no batch state has been touched.
    pub(crate) fn validate(&self) -> BulkResult<()> {
        if self.mutations.is_empty() {
            return Err(BulkError::InvalidArgument {
                message: "row mutation has no cell mutations".to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (Vec<u8>, Vec<CellMutation>) {
        (self.row_key, self.mutations)
    }
}

// ============================================================================
// READ-MODIFY-WRITE
// ============================================================================

/// One transformation applied by a read-modify-write request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadModifyWriteRule {
    /// Append `value` to the current cell contents.
    Append { column: String, value: Vec<u8> },
    /// Interpret the current cell as a big-endian i64 and add `delta`.
    Increment { column: String, delta: i64 },
}

/// A read-modify-write request for a single row.
///
/// Never batched: the engine passes it straight through to the transport's
/// single-request path, bypassing assembly and flow control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadModifyWriteRow {
    row_key: Vec<u8>,
    rules: Vec<ReadModifyWriteRule>,
}

impl ReadModifyWriteRow {
    pub fn new(row_key: impl Into<Vec<u8>>) -> Self {
        Self {
            row_key: row_key.into(),
            rules: Vec::new(),
        }
    }

    /// Append `value` to the cell in `column`.
    #[must_use]
    pub fn append(mut self, column: impl Into<String>, value: Vec<u8>) -> Self {
        self.rules.push(ReadModifyWriteRule::Append {
            column: column.into(),
            value,
        });
        self
    }

    /// Add `delta` to the integer cell in `column`.
    #[must_use]
    pub fn increment(mut self, column: impl Into<String>, delta: i64) -> Self {
        self.rules.push(ReadModifyWriteRule::Increment {
            column: column.into(),
            delta,
        });
        self
    }

    #[inline]
    pub fn row_key(&self) -> &[u8] {
        &self.row_key
    }

    #[inline]
    pub fn rules(&self) -> &[ReadModifyWriteRule] {
        &self.rules
    }
}

// ============================================================================
// ROW RESULT
// ============================================================================

/// One cell of a returned row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowCell {
    pub column: String,
    pub value: Vec<u8>,
    pub timestamp_micros: i64,
}

/// A row returned by the read-modify-write path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    key: Vec<u8>,
    cells: Vec<RowCell>,
}

impl Row {
    pub fn new(key: impl Into<Vec<u8>>, cells: Vec<RowCell>) -> Self {
        Self {
            key: key.into(),
            cells,
        }
    }

    #[inline]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    #[inline]
    pub fn cells(&self) -> &[RowCell] {
        &self.cells
    }
}
