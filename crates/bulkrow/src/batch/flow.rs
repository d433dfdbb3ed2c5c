//! Weighted admission gate bounding in-flight entries and bytes.
//!
//! Capacity is a pair of counting semaphores, one per dimension. A closed
//! batch reserves (entry count, byte size) before dispatch and the
//! reservation is returned entry-by-entry as outcome slots resolve, so a
//! batch with mixed per-entry latencies recovers capacity incrementally.
//!
//! Acquisition is requested only for already-closed batches and never while
//! the open-batch lock is held; in-flight work always releases its permits
//! independently of any waiter, so acquisition cannot deadlock with
//! dispatch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::config::FlowControlConfig;
use crate::error::{BulkError, BulkResult};

// ============================================================================
// FLOW CONTROLLER
// ============================================================================

/// Admission gate over (in-flight entries, in-flight bytes).
#[derive(Debug)]
pub struct FlowController {
    entries: Arc<Semaphore>,
    bytes: Arc<Semaphore>,
    max_entries: usize,
    max_bytes: usize,
    acquire_timeout: Option<Duration>,
}

impl FlowController {
    /// Build a controller from validated configuration.
    pub fn new(config: &FlowControlConfig) -> Self {
        Self {
            entries: Arc::new(Semaphore::new(config.max_in_flight_entries)),
            bytes: Arc::new(Semaphore::new(config.max_in_flight_bytes)),
            max_entries: config.max_in_flight_entries,
            max_bytes: config.max_in_flight_bytes,
            acquire_timeout: config.acquire_timeout(),
        }
    }

    /// Reserve capacity for a closed batch of `entry_count` entries totaling
    /// `byte_size` bytes. Suspends cooperatively until capacity is available.
    ///
    /// A reservation larger than total capacity is clamped to total capacity
    /// so an oversized batch can still be admitted (alone).
    ///
    /// # Errors
    /// - `BulkError::FlowControlTimeout` if a maximum wait is configured and
    ///   capacity did not free up in time. No permits are retained.
    pub async fn acquire(
        &self,
        entry_count: usize,
        byte_size: usize,
    ) -> BulkResult<FlowControlToken> {
        // Config validation bounds both capacities to u32.
        let entry_permits = entry_count.min(self.max_entries) as u32;
        let byte_permits = byte_size.min(self.max_bytes) as u32;

        let acquisition = async {
            let entry_guard = self
                .entries
                .acquire_many(entry_permits)
                .await
                .map_err(|_| BulkError::Internal {
                    message: "flow control entry semaphore closed".to_string(),
                })?;
            let byte_guard = self
                .bytes
                .acquire_many(byte_permits)
                .await
                .map_err(|_| BulkError::Internal {
                    message: "flow control byte semaphore closed".to_string(),
                })?;
            // Both dimensions reserved; detach them from the guards so the
            // token controls release. Cancellation before this point drops
            // the guards and returns the partial reservation.
            entry_guard.forget();
            byte_guard.forget();
            Ok::<(), BulkError>(())
        };

        match self.acquire_timeout {
            Some(limit) => match tokio::time::timeout(limit, acquisition).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(BulkError::FlowControlTimeout {
                        waited_ms: limit.as_millis() as u64,
                    });
                }
            },
            None => acquisition.await?,
        }

        Ok(FlowControlToken {
            entries: Arc::clone(&self.entries),
            bytes: Arc::clone(&self.bytes),
            remaining_entries: entry_permits,
            remaining_bytes: byte_permits,
        })
    }

    /// Entry capacity currently available for admission.
    #[inline]
    pub fn available_entries(&self) -> usize {
        self.entries.available_permits()
    }

    /// Byte capacity currently available for admission.
    #[inline]
    pub fn available_bytes(&self) -> usize {
        self.bytes.available_permits()
    }
}

// ============================================================================
// FLOW CONTROL TOKEN
// ============================================================================

/// Reserved capacity for one in-flight batch.
///
/// Release capacity entry-by-entry with [`release_entry`]; any remainder is
/// returned when the token drops, so capacity cannot leak on failure paths.
///
/// [`release_entry`]: FlowControlToken::release_entry
#[derive(Debug)]
pub struct FlowControlToken {
    entries: Arc<Semaphore>,
    bytes: Arc<Semaphore>,
    remaining_entries: u32,
    remaining_bytes: u32,
}

impl FlowControlToken {
    /// Return the capacity held for one resolved entry of `byte_size` bytes.
    ///
    /// Releases are clamped to what the token still holds: if the batch's
    /// reservation was clamped at acquisition, per-entry releases can never
    /// return more permits than were taken.
    pub fn release_entry(&mut self, byte_size: usize) {
        if self.remaining_entries > 0 {
            self.remaining_entries -= 1;
            self.entries.add_permits(1);
        }
        let release = (byte_size as u64).min(u64::from(self.remaining_bytes)) as u32;
        if release > 0 {
            self.remaining_bytes -= release;
            self.bytes.add_permits(release as usize);
        }
    }

    /// Entries still reserved by this token.
    #[inline]
    pub fn remaining_entries(&self) -> usize {
        self.remaining_entries as usize
    }

    /// Bytes still reserved by this token.
    #[inline]
    pub fn remaining_bytes(&self) -> usize {
        self.remaining_bytes as usize
    }
}

impl Drop for FlowControlToken {
    fn drop(&mut self) {
        if self.remaining_entries > 0 {
            self.entries.add_permits(self.remaining_entries as usize);
            self.remaining_entries = 0;
        }
        if self.remaining_bytes > 0 {
            self.bytes.add_permits(self.remaining_bytes as usize);
            self.remaining_bytes = 0;
        }
    }
}
