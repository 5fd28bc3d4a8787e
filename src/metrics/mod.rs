//! Metrics collection and reporting for indexing cycles
//!
//! Every cycle produces a `CycleReport`; the updater folds them into
//! cumulative `UpdaterStats`.

use crate::indexing::errors::{EntryFailure, ErrorCategory};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Outcome of one drain cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Entries popped from the queue, duplicates included
    pub drained: usize,
    /// Drained entries collapsed into a later one with the same id
    pub duplicates: usize,
    /// Prior on-disk records found for the drained ids
    pub stale_found: u64,
    /// Prior records removed
    pub deleted: u64,
    /// Delete handles that matched nothing by the time they were removed
    pub already_removed: u64,
    /// Records appended
    pub indexed: usize,
    /// Entries skipped
    pub failures: Vec<EntryFailure>,
    /// Phases aborted for this cycle, with the reason
    pub phase_errors: Vec<String>,

    pub drain_duration: Duration,
    pub delete_duration: Duration,
    pub index_duration: Duration,
    pub total_duration: Duration,
}

impl CycleReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the cycle had nothing to do
    pub fn is_empty(&self) -> bool {
        self.drained == 0
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Failures that will not succeed when queued again
    pub fn permanent_failures(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.category == ErrorCategory::Permanent)
            .count()
    }

    /// Failures grouped by stage name
    pub fn failures_by_stage(&self) -> HashMap<String, usize> {
        let mut by_stage = HashMap::new();
        for failure in &self.failures {
            *by_stage.entry(failure.stage.to_string()).or_insert(0) += 1;
        }
        by_stage
    }

    /// Entries indexed per second
    pub fn throughput(&self) -> f64 {
        if self.total_duration.as_secs_f64() == 0.0 {
            return 0.0;
        }
        self.indexed as f64 / self.total_duration.as_secs_f64()
    }

    /// Log a one-line summary plus phase errors
    pub fn log_summary(&self) {
        tracing::info!(
            "Indexing cycle: {} drained ({} duplicates), {} stale, {} deleted, {} indexed, {} skipped in {:.2}s",
            self.drained,
            self.duplicates,
            self.stale_found,
            self.deleted,
            self.indexed,
            self.failed(),
            self.total_duration.as_secs_f64()
        );
        tracing::debug!(
            "Phase breakdown: drain {:?}, delete {:?}, index {:?}",
            self.drain_duration,
            self.delete_duration,
            self.index_duration
        );
        for error in &self.phase_errors {
            tracing::error!("Phase aborted: {}", error);
        }
    }
}

/// Cumulative updater statistics
#[derive(Debug, Clone, Default)]
pub struct UpdaterStats {
    /// Cycles that had work to do
    pub cycles: u64,
    pub total_drained: u64,
    pub total_indexed: u64,
    pub total_deleted: u64,
    pub total_failures: u64,
    pub total_phase_errors: u64,
    pub last_report: Option<CycleReport>,
}

impl UpdaterStats {
    /// Fold a cycle report in
    pub fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.total_drained += report.drained as u64;
        self.total_indexed += report.indexed as u64;
        self.total_deleted += report.deleted;
        self.total_failures += report.failed() as u64;
        self.total_phase_errors += report.phase_errors.len() as u64;
        self.last_report = Some(report.clone());
    }
}

/// Timer for measuring phase durations
#[derive(Debug)]
pub struct PhaseTimer {
    start: Instant,
}

impl PhaseTimer {
    /// Start a new timer
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    /// Get elapsed time since timer started
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for PhaseTimer {
    fn default() -> Self {
        Self::new()
    }
}
