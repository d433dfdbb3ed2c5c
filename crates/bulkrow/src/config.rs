//! Configuration for the bulk mutation engine.
//!
//! # Loading Configuration
//!
//! ```rust,ignore
//! use bulkrow::BulkMutationConfig;
//!
//! // Load from file
//! let config = BulkMutationConfig::from_file("bulkrow.toml")?;
//!
//! // Or use defaults
//! let config = BulkMutationConfig::default();
//!
//! // With environment overrides
//! let config = BulkMutationConfig::default().with_env_overrides();
//! ```
//!
//! # TOML Structure
//!
//! ```toml
//! [batching]
//! max_batch_entries = 125
//! max_batch_bytes = 1048576
//! autoflush_interval_ms = 1000
//!
//! [flow]
//! max_in_flight_entries = 1000
//! max_in_flight_bytes = 67108864
//! acquire_timeout_ms = 30000
//! ```

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BulkError, BulkResult};

// ============================================================================
// BATCHING CONFIG
// ============================================================================

/// Controls when the open batch is closed and dispatched.
///
/// A batch closes when, after an append, it has reached `max_batch_entries`
/// or its cumulative entry size has reached `max_batch_bytes`; a single
/// large entry may therefore carry a batch past the byte limit. An optional
/// auto-flush interval bounds how long a partially filled batch can sit
/// unsent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Maximum number of entries per batched call.
    #[serde(default = "default_max_batch_entries")]
    pub max_batch_entries: usize,

    /// Maximum cumulative approximate entry size per batched call, in bytes.
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: usize,

    /// Interval at which a background task sends the open batch even if it
    /// is not full. `None` disables the auto-flush task.
    #[serde(default)]
    pub autoflush_interval_ms: Option<u64>,
}

fn default_max_batch_entries() -> usize {
    125
}

fn default_max_batch_bytes() -> usize {
    1024 * 1024 // 1 MiB
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_batch_entries: default_max_batch_entries(),
            max_batch_bytes: default_max_batch_bytes(),
            autoflush_interval_ms: None,
        }
    }
}

impl BatchingConfig {
    /// Validate batching configuration values.
    ///
    /// # Errors
    /// - `BulkError::ConfigError` if max_batch_entries is 0
    /// - `BulkError::ConfigError` if max_batch_bytes is 0
    /// - `BulkError::ConfigError` if autoflush_interval_ms is Some(0)
    pub fn validate(&self) -> BulkResult<()> {
        if self.max_batch_entries == 0 {
            return Err(BulkError::ConfigError {
                message: "max_batch_entries must be > 0".to_string(),
            });
        }
        if self.max_batch_bytes == 0 {
            return Err(BulkError::ConfigError {
                message: "max_batch_bytes must be > 0".to_string(),
            });
        }
        if self.autoflush_interval_ms == Some(0) {
            return Err(BulkError::ConfigError {
                message: "autoflush_interval_ms must be > 0 when set".to_string(),
            });
        }
        Ok(())
    }

    /// Auto-flush interval as a `Duration`, if enabled.
    pub fn autoflush_interval(&self) -> Option<Duration> {
        self.autoflush_interval_ms.map(Duration::from_millis)
    }
}

// ============================================================================
// FLOW CONTROL CONFIG
// ============================================================================

/// Capacity bounds for in-flight work.
///
/// Admission of a closed batch reserves (entry count, byte size) against
/// these limits; capacity is returned entry-by-entry as outcomes resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowControlConfig {
    /// Maximum entries that may be in flight at once.
    #[serde(default = "default_max_in_flight_entries")]
    pub max_in_flight_entries: usize,

    /// Maximum cumulative approximate entry bytes in flight at once.
    #[serde(default = "default_max_in_flight_bytes")]
    pub max_in_flight_bytes: usize,

    /// Maximum time to wait for capacity before failing the batch with
    /// `FlowControlTimeout`. `None` waits indefinitely.
    #[serde(default)]
    pub acquire_timeout_ms: Option<u64>,
}

fn default_max_in_flight_entries() -> usize {
    1000
}

fn default_max_in_flight_bytes() -> usize {
    64 * 1024 * 1024 // 64 MiB
}

impl Default for FlowControlConfig {
    fn default() -> Self {
        Self {
            max_in_flight_entries: default_max_in_flight_entries(),
            max_in_flight_bytes: default_max_in_flight_bytes(),
            acquire_timeout_ms: None,
        }
    }
}

impl FlowControlConfig {
    /// Validate flow-control configuration values.
    ///
    /// Both capacities must fit a `u32` because they are tracked as
    /// semaphore permits.
    ///
    /// # Errors
    /// - `BulkError::ConfigError` if either capacity is 0 or exceeds `u32::MAX`
    /// - `BulkError::ConfigError` if acquire_timeout_ms is Some(0)
    pub fn validate(&self) -> BulkResult<()> {
        if self.max_in_flight_entries == 0 {
            return Err(BulkError::ConfigError {
                message: "max_in_flight_entries must be > 0".to_string(),
            });
        }
        if self.max_in_flight_bytes == 0 {
            return Err(BulkError::ConfigError {
                message: "max_in_flight_bytes must be > 0".to_string(),
            });
        }
        if self.max_in_flight_entries > u32::MAX as usize {
            return Err(BulkError::ConfigError {
                message: format!(
                    "max_in_flight_entries must be <= {}, got {}",
                    u32::MAX,
                    self.max_in_flight_entries
                ),
            });
        }
        if self.max_in_flight_bytes > u32::MAX as usize {
            return Err(BulkError::ConfigError {
                message: format!(
                    "max_in_flight_bytes must be <= {}, got {}",
                    u32::MAX,
                    self.max_in_flight_bytes
                ),
            });
        }
        if self.acquire_timeout_ms == Some(0) {
            return Err(BulkError::ConfigError {
                message: "acquire_timeout_ms must be > 0 when set".to_string(),
            });
        }
        Ok(())
    }

    /// Acquisition timeout as a `Duration`, if configured.
    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }
}

// ============================================================================
// ROOT CONFIG
// ============================================================================

/// Root configuration for a [`BulkMutation`](crate::BulkMutation) instance.
///
/// Load from TOML or use `Default::default()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkMutationConfig {
    /// Batch close triggers and auto-flush.
    #[serde(default)]
    pub batching: BatchingConfig,

    /// In-flight capacity bounds.
    #[serde(default)]
    pub flow: FlowControlConfig,
}

impl BulkMutationConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// - `BulkError::ConfigError` if the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> BulkResult<Self> {
        let path = path.as_ref();

        let contents = std::fs::read_to_string(path).map_err(|e| BulkError::ConfigError {
            message: format!("failed to read config file '{}': {}", path.display(), e),
        })?;

        toml::from_str(&contents).map_err(|e| BulkError::ConfigError {
            message: format!("failed to parse TOML in '{}': {}", path.display(), e),
        })
    }

    /// Create configuration from a TOML string.
    ///
    /// # Errors
    /// - `BulkError::ConfigError` if TOML parsing fails
    pub fn from_toml_str(toml: &str) -> BulkResult<Self> {
        toml::from_str(toml).map_err(|e| BulkError::ConfigError {
            message: format!("failed to parse TOML: {}", e),
        })
    }

    /// Serialize configuration to a TOML string.
    ///
    /// # Errors
    /// - `BulkError::ConfigError` if serialization fails
    pub fn to_toml_string(&self) -> BulkResult<String> {
        toml::to_string_pretty(self).map_err(|e| BulkError::ConfigError {
            message: format!("failed to serialize to TOML: {}", e),
        })
    }

    /// Validate all nested configurations, returning the first error found.
    ///
    /// # Errors
    /// - `BulkError::ConfigError` with the offending section prefixed
    pub fn validate(&self) -> BulkResult<()> {
        self.batching.validate().map_err(|e| BulkError::ConfigError {
            message: format!("[batching] {}", e),
        })?;

        self.flow.validate().map_err(|e| BulkError::ConfigError {
            message: format!("[flow] {}", e),
        })?;

        Ok(())
    }

    /// Apply environment variable overrides. Prefix: `BULKROW_`.
    ///
    /// # Supported Variables
    ///
    /// | Variable | Config Path |
    /// |----------|-------------|
    /// | `BULKROW_MAX_BATCH_ENTRIES` | `batching.max_batch_entries` |
    /// | `BULKROW_MAX_BATCH_BYTES` | `batching.max_batch_bytes` |
    /// | `BULKROW_AUTOFLUSH_INTERVAL_MS` | `batching.autoflush_interval_ms` |
    /// | `BULKROW_MAX_IN_FLIGHT_ENTRIES` | `flow.max_in_flight_entries` |
    /// | `BULKROW_MAX_IN_FLIGHT_BYTES` | `flow.max_in_flight_bytes` |
    /// | `BULKROW_ACQUIRE_TIMEOUT_MS` | `flow.acquire_timeout_ms` |
    ///
    /// Unparseable values are ignored and the existing value kept.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = env::var("BULKROW_MAX_BATCH_ENTRIES") {
            if let Ok(n) = val.parse::<usize>() {
                self.batching.max_batch_entries = n;
            }
        }
        if let Ok(val) = env::var("BULKROW_MAX_BATCH_BYTES") {
            if let Ok(n) = val.parse::<usize>() {
                self.batching.max_batch_bytes = n;
            }
        }
        if let Ok(val) = env::var("BULKROW_AUTOFLUSH_INTERVAL_MS") {
            if let Ok(n) = val.parse::<u64>() {
                self.batching.autoflush_interval_ms = Some(n);
            }
        }
        if let Ok(val) = env::var("BULKROW_MAX_IN_FLIGHT_ENTRIES") {
            if let Ok(n) = val.parse::<usize>() {
                self.flow.max_in_flight_entries = n;
            }
        }
        if let Ok(val) = env::var("BULKROW_MAX_IN_FLIGHT_BYTES") {
            if let Ok(n) = val.parse::<usize>() {
                self.flow.max_in_flight_bytes = n;
            }
        }
        if let Ok(val) = env::var("BULKROW_ACQUIRE_TIMEOUT_MS") {
            if let Ok(n) = val.parse::<u64>() {
                self.flow.acquire_timeout_ms = Some(n);
            }
        }

        self
    }
}

// ============================================================================
// TESTS
// ============================================================================
