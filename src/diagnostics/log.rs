//! Per-run counters.
//!
//! Counters are atomics so a shared log can be updated from parallel
//! reconstruction workers without locking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for one pipeline run.
#[derive(Debug)]
pub struct RunLog {
    /// Samples accepted from the source
    samples_ingested: AtomicU64,
    /// Source rows skipped as malformed
    rows_skipped: AtomicU64,
    /// Windows blended into the output
    windows_processed: AtomicU64,
    /// Calls made to the inference engine
    inference_calls: AtomicU64,
    /// Run start time
    started_at: DateTime<Utc>,
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            samples_ingested: AtomicU64::new(0),
            rows_skipped: AtomicU64::new(0),
            windows_processed: AtomicU64::new(0),
            inference_calls: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn record_samples(&self, count: u64) {
        self.samples_ingested.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_skipped_rows(&self, count: u64) {
        self.rows_skipped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_window(&self) {
        self.windows_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inference_call(&self) {
        self.inference_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> RunStats {
        RunStats {
            samples_ingested: self.samples_ingested.load(Ordering::Relaxed),
            rows_skipped: self.rows_skipped.load(Ordering::Relaxed),
            windows_processed: self.windows_processed.load(Ordering::Relaxed),
            inference_calls: self.inference_calls.load(Ordering::Relaxed),
            started_at: self.started_at,
            elapsed_ms: (Utc::now() - self.started_at).num_milliseconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Run Statistics:\n\
             - Samples ingested: {}\n\
             - Rows skipped: {}\n\
             - Windows processed: {}\n\
             - Inference calls: {}\n\
             - Elapsed: {} ms",
            stats.samples_ingested,
            stats.rows_skipped,
            stats.windows_processed,
            stats.inference_calls,
            stats.elapsed_ms
        )
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.samples_ingested.store(0, Ordering::Relaxed);
        self.rows_skipped.store(0, Ordering::Relaxed);
        self.windows_processed.store(0, Ordering::Relaxed);
        self.inference_calls.store(0, Ordering::Relaxed);
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of run counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub samples_ingested: u64,
    pub rows_skipped: u64,
    pub windows_processed: u64,
    pub inference_calls: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Thread-safe shared run log.
pub type SharedRunLog = Arc<RunLog>;

pub fn create_shared_log() -> SharedRunLog {
    Arc::new(RunLog::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_log_counting() {
        let log = RunLog::new();

        log.record_samples(4000);
        log.record_skipped_rows(2);
        log.record_window();
        log.record_window();
        log.record_inference_call();

        let stats = log.stats();
        assert_eq!(stats.samples_ingested, 4000);
        assert_eq!(stats.rows_skipped, 2);
        assert_eq!(stats.windows_processed, 2);
        assert_eq!(stats.inference_calls, 1);
    }

    #[test]
    fn test_run_log_reset() {
        let log = RunLog::new();
        log.record_samples(10);
        log.record_window();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.samples_ingested, 0);
        assert_eq!(stats.windows_processed, 0);
    }

    #[test]
    fn test_summary_format() {
        let summary = RunLog::new().summary();
        assert!(summary.contains("Samples ingested"));
        assert!(summary.contains("Windows processed"));
    }
}
