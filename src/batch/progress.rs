//! Live per-batch progress counters.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::types::{BatchStatus, ItemOutcome};

/// Point-in-time view of a running batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub batch_id: String,
    pub status: BatchStatus,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub timed_out: usize,
    pub cache_hits: usize,
    /// Terminal items so far, of any outcome.
    pub processed: usize,
    /// Percent of items with a terminal outcome, two decimals.
    pub percentage: f64,
    pub elapsed_secs: f64,
    /// Linear extrapolation from the items processed so far.
    pub eta_secs: Option<f64>,
}

#[derive(Debug)]
struct Counters {
    status: BatchStatus,
    completed: usize,
    failed: usize,
    cancelled: usize,
    timed_out: usize,
    cache_hits: usize,
}

/// Counters for one batch, updated by its workers.
///
/// Each item records exactly one terminal outcome.
#[derive(Debug)]
pub struct ProgressTracker {
    batch_id: String,
    total: usize,
    started: Instant,
    counters: Mutex<Counters>,
}

impl ProgressTracker {
    pub fn new(batch_id: impl Into<String>, total: usize) -> Self {
        Self {
            batch_id: batch_id.into(),
            total,
            started: Instant::now(),
            counters: Mutex::new(Counters {
                status: BatchStatus::Pending,
                completed: 0,
                failed: 0,
                cancelled: 0,
                timed_out: 0,
                cache_hits: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_status(&self, status: BatchStatus) {
        self.lock().status = status;
    }

    /// Record one item's terminal outcome.
    pub fn record(&self, outcome: &ItemOutcome, cached: bool) {
        let mut c = self.lock();
        match outcome {
            ItemOutcome::Success { .. } => c.completed += 1,
            ItemOutcome::Failed { .. } => c.failed += 1,
            ItemOutcome::Cancelled => c.cancelled += 1,
            ItemOutcome::TimedOut => c.timed_out += 1,
        }
        if cached {
            c.cache_hits += 1;
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let c = self.lock();
        let processed = c.completed + c.failed + c.cancelled + c.timed_out;
        let elapsed = self.started.elapsed().as_secs_f64();

        let percentage = if self.total > 0 {
            (processed as f64 / self.total as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };
        let eta_secs = (processed > 0 && processed < self.total).then(|| {
            let per_item = elapsed / processed as f64;
            (per_item * (self.total - processed) as f64 * 100.0).round() / 100.0
        });

        ProgressSnapshot {
            batch_id: self.batch_id.clone(),
            status: c.status,
            total: self.total,
            completed: c.completed,
            failed: c.failed,
            cancelled: c.cancelled,
            timed_out: c.timed_out,
            cache_hits: c.cache_hits,
            processed,
            percentage,
            elapsed_secs: (elapsed * 1000.0).round() / 1000.0,
            eta_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::AnalysisReport;

    #[test]
    fn counts_each_outcome_once() {
        let tracker = ProgressTracker::new("b", 4);
        tracker.record(
            &ItemOutcome::Success {
                report: AnalysisReport::new(),
            },
            true,
        );
        tracker.record(&ItemOutcome::Failed { error: "x".into() }, false);
        tracker.record(&ItemOutcome::Cancelled, false);

        let snap = tracker.snapshot();
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.cancelled, 1);
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.processed, 3);
        assert_eq!(snap.percentage, 75.0);
        assert!(snap.eta_secs.is_some());
    }

    #[test]
    fn fresh_tracker_is_pending_without_eta() {
        let snap = ProgressTracker::new("b", 2).snapshot();
        assert_eq!(snap.status, BatchStatus::Pending);
        assert_eq!(snap.processed, 0);
        assert_eq!(snap.percentage, 0.0);
        assert!(snap.eta_secs.is_none());
    }

    #[test]
    fn finished_batch_has_no_eta() {
        let tracker = ProgressTracker::new("b", 1);
        tracker.record(&ItemOutcome::TimedOut, false);
        let snap = tracker.snapshot();
        assert_eq!(snap.percentage, 100.0);
        assert!(snap.eta_secs.is_none());
    }
}
