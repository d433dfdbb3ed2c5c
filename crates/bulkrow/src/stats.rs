//! Engine statistics for monitoring and debugging.
//!
//! All fields use atomics for thread-safe concurrent updates; `summary()`
//! takes a non-atomic snapshot for reporting.

use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// BULK STATS
// ============================================================================

/// Counters updated across the engine's concurrent paths.
#[derive(Debug, Default)]
pub struct BulkStats {
    /// Mutations accepted by `add`.
    entries_added: AtomicU64,

    /// Entries whose outcome slot resolved successfully.
    entries_succeeded: AtomicU64,

    /// Entries whose outcome slot resolved with a failure.
    entries_failed: AtomicU64,

    /// Batched calls issued to the transport.
    batches_sent: AtomicU64,

    /// Batches that failed wholesale (transport failure or admission timeout).
    batch_failures: AtomicU64,

    /// Cumulative approximate bytes handed to the transport.
    bytes_sent: AtomicU64,

    /// Running sum of sent batch sizes, for average batch size.
    batch_entry_sum: AtomicU64,
}

impl Clone for BulkStats {
    fn clone(&self) -> Self {
        Self {
            entries_added: AtomicU64::new(self.entries_added.load(Ordering::Relaxed)),
            entries_succeeded: AtomicU64::new(self.entries_succeeded.load(Ordering::Relaxed)),
            entries_failed: AtomicU64::new(self.entries_failed.load(Ordering::Relaxed)),
            batches_sent: AtomicU64::new(self.batches_sent.load(Ordering::Relaxed)),
            batch_failures: AtomicU64::new(self.batch_failures.load(Ordering::Relaxed)),
            bytes_sent: AtomicU64::new(self.bytes_sent.load(Ordering::Relaxed)),
            batch_entry_sum: AtomicU64::new(self.batch_entry_sum.load(Ordering::Relaxed)),
        }
    }
}

impl BulkStats {
    /// Record a mutation accepted by `add`.
    #[inline]
    pub fn record_entry_added(&self) {
        self.entries_added.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batched call handed to the transport.
    #[inline]
    pub fn record_batch_sent(&self, entries: usize, bytes: usize) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.batch_entry_sum.fetch_add(entries as u64, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record a wholesale batch failure.
    #[inline]
    pub fn record_batch_failure(&self) {
        self.batch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one entry's resolution.
    #[inline]
    pub fn record_completion(&self, success: bool) {
        if success {
            self.entries_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.entries_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Snapshot of current statistics.
    #[must_use]
    pub fn summary(&self) -> BulkStatsSummary {
        let batches = self.batches_sent.load(Ordering::Relaxed);
        let entry_sum = self.batch_entry_sum.load(Ordering::Relaxed);

        BulkStatsSummary {
            entries_added: self.entries_added.load(Ordering::Relaxed),
            entries_succeeded: self.entries_succeeded.load(Ordering::Relaxed),
            entries_failed: self.entries_failed.load(Ordering::Relaxed),
            batches_sent: batches,
            batch_failures: self.batch_failures.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            avg_batch_entries: if batches > 0 {
                (entry_sum as f64) / (batches as f64)
            } else {
                0.0
            },
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.entries_added.store(0, Ordering::Relaxed);
        self.entries_succeeded.store(0, Ordering::Relaxed);
        self.entries_failed.store(0, Ordering::Relaxed);
        self.batches_sent.store(0, Ordering::Relaxed);
        self.batch_failures.store(0, Ordering::Relaxed);
        self.bytes_sent.store(0, Ordering::Relaxed);
        self.batch_entry_sum.store(0, Ordering::Relaxed);
    }
}

/// Non-atomic snapshot of [`BulkStats`].
#[derive(Debug, Clone, PartialEq)]
pub struct BulkStatsSummary {
    pub entries_added: u64,
    pub entries_succeeded: u64,
    pub entries_failed: u64,
    pub batches_sent: u64,
    pub batch_failures: u64,
    pub bytes_sent: u64,
    pub avg_batch_entries: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_summary_is_zero() {
        let stats = BulkStats::default();
        let summary = stats.summary();

        assert_eq!(summary.entries_added, 0);
        assert_eq!(summary.batches_sent, 0);
        assert_eq!(summary.avg_batch_entries, 0.0);
    }

    #[test]
    fn test_record_entry_added() {
        let stats = BulkStats::default();
        stats.record_entry_added();
        stats.record_entry_added();
        assert_eq!(stats.summary().entries_added, 2);
    }

    #[test]
    fn test_record_batch_sent_tracks_average() {
        let stats = BulkStats::default();
        stats.record_batch_sent(10, 1000);
        stats.record_batch_sent(20, 3000);

        let summary = stats.summary();
        assert_eq!(summary.batches_sent, 2);
        assert_eq!(summary.bytes_sent, 4000);
        assert!((summary.avg_batch_entries - 15.0).abs() < 0.001);
    }

    #[test]
    fn test_record_completion() {
        let stats = BulkStats::default();
        stats.record_completion(true);
        stats.record_completion(true);
        stats.record_completion(false);

        let summary = stats.summary();
        assert_eq!(summary.entries_succeeded, 2);
        assert_eq!(summary.entries_failed, 1);
    }

    #[test]
    fn test_record_batch_failure() {
        let stats = BulkStats::default();
        stats.record_batch_failure();
        assert_eq!(stats.summary().batch_failures, 1);
    }

    #[test]
    fn test_reset_clears_all() {
        let stats = BulkStats::default();
        stats.record_entry_added();
        stats.record_batch_sent(5, 500);
        stats.record_completion(true);

        stats.reset();

        let summary = stats.summary();
        assert_eq!(summary.entries_added, 0);
        assert_eq!(summary.batches_sent, 0);
        assert_eq!(summary.entries_succeeded, 0);
        assert_eq!(summary.bytes_sent, 0);
    }

    #[test]
    fn test_clone_snapshots_values() {
        let stats = BulkStats::default();
        stats.record_entry_added();
        stats.record_batch_sent(3, 30);

        let cloned = stats.clone();
        stats.record_entry_added();

        assert_eq!(cloned.summary().entries_added, 1);
        assert_eq!(stats.summary().entries_added, 2);
    }
}
