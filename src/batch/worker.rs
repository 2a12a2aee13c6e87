//! Worker loops that drain a batch's scheduler.
//!
//! A batch runs `concurrency` loops side by side; each loop handles one item
//! at a time. Before starting an item a loop checks the batch's cancel flag
//! and deadline, so once either trips no further item is started.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::progress::ProgressTracker;
use super::scheduler::ItemScheduler;
use super::types::{BatchItem, ItemOutcome, ItemResult};
use crate::analyzer::{AnalysisReport, AnalyzerRegistry};
use crate::cache::CacheInstance;
use crate::cache::key::analysis_key;
use crate::telemetry;

/// Shared state for the workers of one batch.
pub(crate) struct WorkerContext<'a> {
    pub batch_id: &'a str,
    pub registry: &'a AnalyzerRegistry,
    pub cache: &'a Arc<CacheInstance>,
    pub scheduler: &'a ItemScheduler,
    pub progress: &'a ProgressTracker,
    pub cancelled: &'a AtomicBool,
    pub deadline: Instant,
}

impl WorkerContext<'_> {
    /// Process items until the queue is empty.
    pub(crate) async fn run(&self, worker: usize) -> Vec<ItemResult> {
        let mut results = Vec::new();
        while let Some(item) = self.scheduler.next() {
            let result = if self.cancelled.load(Ordering::Acquire) {
                ItemResult::skipped(&item, ItemOutcome::Cancelled)
            } else if Instant::now() >= self.deadline {
                ItemResult::skipped(&item, ItemOutcome::TimedOut)
            } else {
                debug!(batch_id = self.batch_id, item_id = %item.item_id, worker, "processing item");
                self.process(item).await
            };
            self.finish(&result);
            results.push(result);
        }
        results
    }

    /// Record a terminal outcome in progress and metrics.
    pub(crate) fn finish(&self, result: &ItemResult) {
        self.progress.record(&result.outcome, result.cached);
        metrics::counter!(telemetry::BATCH_ITEMS_TOTAL, "status" => result.outcome.label())
            .increment(1);
    }

    async fn process(&self, item: BatchItem) -> ItemResult {
        let started = Instant::now();
        let (outcome, cached) = self.outcome_for(&item).await;

        if let ItemOutcome::Failed { ref error } = outcome {
            warn!(batch_id = self.batch_id, item_id = %item.item_id, %error, "item failed");
        }

        ItemResult {
            item_id: item.item_id,
            index: item.index,
            outcome,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            framework_count: item.frameworks.len(),
            cached,
        }
    }

    async fn outcome_for(&self, item: &BatchItem) -> (ItemOutcome, bool) {
        if item.content.trim().is_empty() {
            let error = crate::HuginnError::InvalidInput("content is empty".into());
            return (
                ItemOutcome::Failed {
                    error: error.to_string(),
                },
                false,
            );
        }

        let key = analysis_key(&item.content, &item.frameworks);
        if let Some(value) = self.cache.get(&key) {
            match serde_json::from_value::<AnalysisReport>(value) {
                Ok(report) => return (ItemOutcome::Success { report }, true),
                Err(e) => {
                    debug!(cache = self.cache.name(), %key, error = %e, "discarding unreadable cached report");
                }
            }
        }

        let analysis = self.registry.analyze(&item.content, &item.frameworks);
        match AssertUnwindSafe(analysis).catch_unwind().await {
            Ok(Ok(report)) => {
                self.store(&key, item, &report);
                (ItemOutcome::Success { report }, false)
            }
            Ok(Err(e)) => (
                ItemOutcome::Failed {
                    error: e.to_string(),
                },
                false,
            ),
            Err(panic) => (
                ItemOutcome::Failed {
                    error: format!("analyzer panicked: {}", panic_message(&*panic)),
                },
                false,
            ),
        }
    }

    fn store(&self, key: &str, item: &BatchItem, report: &AnalysisReport) {
        let value = match serde_json::to_value(report) {
            Ok(value) => value,
            Err(e) => {
                warn!(item_id = %item.item_id, error = %e, "report not cacheable");
                return;
            }
        };
        let mut tags: Vec<&str> = item.frameworks.iter().map(String::as_str).collect();
        tags.push(self.batch_id);
        self.cache.put(key, value, &tags, None);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
