// Performance metrics module
//
// Lightweight counters for sync runs, logged on shutdown

use crate::models::SyncOutcome;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Sync metrics
///
/// Uses atomic operations for thread-safe tracking without locks. Shared
/// between the orchestrator and the host via `Arc<Metrics>`.
#[derive(Debug)]
pub struct Metrics {
    /// Triggers that started a run
    pub syncs_started: AtomicU64,

    /// Runs that completed the pipeline (any merge outcome)
    pub syncs_completed: AtomicU64,

    /// Runs aborted by an I/O or internal failure
    pub syncs_failed: AtomicU64,

    /// Triggers dropped because a run was active
    pub triggers_dropped: AtomicU64,

    /// Runs that rewrote the rules file
    pub rules_writes: AtomicU64,

    /// Total fragments collected across all runs
    pub fragments_collected: AtomicU64,

    /// Total time spent in sync runs in milliseconds
    pub total_sync_time_ms: AtomicU64,

    /// Metrics start time
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            syncs_started: AtomicU64::new(0),
            syncs_completed: AtomicU64::new(0),
            syncs_failed: AtomicU64::new(0),
            triggers_dropped: AtomicU64::new(0),
            rules_writes: AtomicU64::new(0),
            fragments_collected: AtomicU64::new(0),
            total_sync_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_sync_started(&self) {
        self.syncs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_trigger_dropped(&self) {
        self.triggers_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the end of a run
    pub fn record_sync_finished(&self, outcome: &SyncOutcome, fragments: usize, duration: Duration) {
        match outcome {
            SyncOutcome::Merged(merge) => {
                self.syncs_completed.fetch_add(1, Ordering::Relaxed);
                if merge.wrote_file() {
                    self.rules_writes.fetch_add(1, Ordering::Relaxed);
                }
            }
            SyncOutcome::Failed(_) => {
                self.syncs_failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.fragments_collected
            .fetch_add(fragments as u64, Ordering::Relaxed);
        self.total_sync_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average run time in milliseconds over finished runs
    pub fn avg_sync_time_ms(&self) -> f64 {
        let total = self.total_sync_time_ms.load(Ordering::Relaxed);
        let count = self.syncs_completed.load(Ordering::Relaxed)
            + self.syncs_failed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Sync Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Syncs: {} started, {} completed, {} failed, {} triggers dropped",
            self.syncs_started.load(Ordering::Relaxed),
            self.syncs_completed.load(Ordering::Relaxed),
            self.syncs_failed.load(Ordering::Relaxed),
            self.triggers_dropped.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Rules file writes: {}, fragments collected: {}",
            self.rules_writes.load(Ordering::Relaxed),
            self.fragments_collected.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Total sync time: {:.2}s (avg: {:.2}ms per run)",
            self.total_sync_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_sync_time_ms()
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
