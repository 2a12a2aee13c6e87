//! Batch lifecycle: validation, dispatch, timeout, summary and history.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep_until};
use tracing::{info, instrument, warn};

use super::progress::{ProgressSnapshot, ProgressTracker};
use super::scheduler::ItemScheduler;
use super::types::{
    BatchItem, BatchReport, BatchRequest, BatchStatus, BatchSummary, CancelAck, HistoryEntry,
    ItemOutcome, ItemResult,
};
use super::worker::WorkerContext;
use crate::analyzer::AnalyzerRegistry;
use crate::cache::CacheManager;
use crate::config::BatchConfig;
use crate::telemetry;
use crate::{HuginnError, Result};

/// Live state of an active batch, shared with status and cancel callers.
#[derive(Debug)]
pub(crate) struct JobHandle {
    cancel_requested: AtomicBool,
    progress: ProgressTracker,
}

/// What [`BatchCoordinator::status`] reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    /// Sorted.
    pub active_batch_ids: Vec<String>,
    pub active_progress: BTreeMap<String, ProgressSnapshot>,
    /// Oldest first.
    pub recent_history: Vec<HistoryEntry>,
    pub config: BatchConfig,
}

type ActiveJobs = HashMap<String, Arc<JobHandle>>;

/// Removes a batch from the active set however `submit` exits.
struct ActiveGuard<'a> {
    active: &'a Mutex<ActiveJobs>,
    batch_id: String,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        lock(self.active).remove(&self.batch_id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs batches of items through the analyzer registry.
///
/// Any number of batches may run at once; ids must be unique among the
/// active ones.
pub struct BatchCoordinator {
    config: BatchConfig,
    registry: Arc<AnalyzerRegistry>,
    caches: Arc<CacheManager>,
    active: Mutex<ActiveJobs>,
    history: Mutex<VecDeque<HistoryEntry>>,
}

impl BatchCoordinator {
    pub fn new(
        config: BatchConfig,
        registry: Arc<AnalyzerRegistry>,
        caches: Arc<CacheManager>,
    ) -> Self {
        Self {
            config,
            registry,
            caches,
            active: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AnalyzerRegistry> {
        &self.registry
    }

    /// Run a batch to completion.
    ///
    /// Validation failures reject the whole submission before any item
    /// starts. After that, every item yields exactly one [`ItemResult`],
    /// returned in submission order.
    #[instrument(skip(self, request), fields(batch_id = %request.batch_id, items = request.items.len()))]
    pub async fn submit(&self, request: BatchRequest) -> Result<BatchReport> {
        let concurrency = self.validate(&request)?;
        let BatchRequest {
            batch_id,
            items,
            default_frameworks,
            priority,
            timeout,
            ..
        } = request;

        let frameworks = default_frameworks
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| self.config.default_frameworks.clone());
        let priority = priority.unwrap_or(0);
        let items: Vec<BatchItem> = items
            .into_iter()
            .enumerate()
            .map(|(index, input)| {
                BatchItem::normalize(input, index, &batch_id, &frameworks, priority)
            })
            .collect();

        let job = Arc::new(JobHandle {
            cancel_requested: AtomicBool::new(false),
            progress: ProgressTracker::new(&batch_id, items.len()),
        });
        let guard = self.register(&batch_id, Arc::clone(&job))?;

        let workers = concurrency.min(items.len());
        let timeout = timeout.unwrap_or_else(|| self.config.timeout());
        info!(workers, timeout_secs = timeout.as_secs_f64(), "batch started");

        let started = Instant::now();
        job.progress.set_status(BatchStatus::Running);
        let mut results = self
            .run(&batch_id, &job, items, workers, started + timeout)
            .await;
        let elapsed = started.elapsed();

        results.sort_by_key(|r| r.index);
        let summary = BatchSummary::from_results(&results, elapsed);
        let status = if job.cancel_requested.load(Ordering::Acquire) && summary.cancelled_items > 0
        {
            BatchStatus::Cancelled
        } else if summary.timed_out_items > 0 {
            BatchStatus::TimedOut
        } else {
            BatchStatus::Completed
        };
        job.progress.set_status(status);

        metrics::histogram!(telemetry::BATCH_DURATION_SECONDS).record(elapsed.as_secs_f64());
        info!(
            %status,
            successful = summary.successful_items,
            failed = summary.failed_items,
            cancelled = summary.cancelled_items,
            timed_out = summary.timed_out_items,
            cache_hits = summary.cache_hits,
            "batch finished"
        );

        let report = BatchReport {
            batch_id,
            status,
            results,
            summary,
        };
        drop(guard);
        self.record_history(HistoryEntry::now(&report));
        Ok(report)
    }

    /// Check a request and return its effective worker count.
    fn validate(&self, request: &BatchRequest) -> Result<usize> {
        if request.batch_id.trim().is_empty() {
            return Err(HuginnError::InvalidBatchId);
        }
        if request.items.is_empty() {
            return Err(HuginnError::EmptyBatch);
        }
        if request.items.len() > self.config.max_batch_size {
            return Err(HuginnError::BatchTooLarge {
                size: request.items.len(),
                max: self.config.max_batch_size,
            });
        }
        let concurrency = request.concurrency.unwrap_or(self.config.workers);
        if concurrency < 1 {
            return Err(HuginnError::InvalidConcurrency(concurrency));
        }
        Ok(concurrency)
    }

    /// Atomically claim `batch_id` in the active set.
    fn register(&self, batch_id: &str, job: Arc<JobHandle>) -> Result<ActiveGuard<'_>> {
        let mut active = lock(&self.active);
        if active.contains_key(batch_id) {
            return Err(HuginnError::DuplicateBatch(batch_id.to_string()));
        }
        active.insert(batch_id.to_string(), job);
        Ok(ActiveGuard {
            active: &self.active,
            batch_id: batch_id.to_string(),
        })
    }

    async fn run(
        &self,
        batch_id: &str,
        job: &JobHandle,
        items: Vec<BatchItem>,
        workers: usize,
        deadline: Instant,
    ) -> Vec<ItemResult> {
        let cache = self.caches.instance(&self.config.cache_name);
        let scheduler = ItemScheduler::new(items);
        let ctx = WorkerContext {
            batch_id,
            registry: &self.registry,
            cache: &cache,
            scheduler: &scheduler,
            progress: &job.progress,
            cancelled: &job.cancel_requested,
            deadline,
        };

        let pool = join_all((0..workers).map(|worker| ctx.run(worker)));
        tokio::pin!(pool);

        let per_worker = tokio::select! {
            done = &mut pool => done,
            _ = sleep_until(deadline) => {
                let pending = scheduler.drain();
                warn!(batch_id, pending = pending.len(), "batch timed out");
                let timed_out: Vec<ItemResult> = pending
                    .iter()
                    .map(|item| ItemResult::skipped(item, ItemOutcome::TimedOut))
                    .collect();
                for result in &timed_out {
                    ctx.finish(result);
                }
                // In-flight items run to completion.
                let mut done = pool.await;
                done.push(timed_out);
                done
            }
        };

        per_worker.into_iter().flatten().collect()
    }

    fn record_history(&self, entry: HistoryEntry) {
        let mut history = lock(&self.history);
        history.push_back(entry);
        while history.len() > self.config.history_limit {
            history.pop_front();
        }
    }

    /// Request cooperative cancellation of an active batch.
    ///
    /// Items not yet started finish as [`ItemOutcome::Cancelled`]; items
    /// already running complete normally.
    pub fn cancel(&self, batch_id: &str) -> Result<CancelAck> {
        let job = lock(&self.active)
            .get(batch_id)
            .cloned()
            .ok_or_else(|| HuginnError::BatchNotFound(batch_id.to_string()))?;
        let already_requested = job.cancel_requested.swap(true, Ordering::AcqRel);
        info!(batch_id, already_requested, "batch cancellation requested");
        Ok(CancelAck {
            batch_id: batch_id.to_string(),
            already_requested,
        })
    }

    /// Whether a batch with this id is currently running.
    pub fn is_active(&self, batch_id: &str) -> bool {
        lock(&self.active).contains_key(batch_id)
    }

    /// Active batches, their progress, and recent history.
    pub fn status(&self) -> CoordinatorStatus {
        let jobs: Vec<(String, Arc<JobHandle>)> = lock(&self.active)
            .iter()
            .map(|(id, job)| (id.clone(), Arc::clone(job)))
            .collect();

        let active_progress: BTreeMap<String, ProgressSnapshot> = jobs
            .into_iter()
            .map(|(id, job)| (id, job.progress.snapshot()))
            .collect();

        CoordinatorStatus {
            active_batch_ids: active_progress.keys().cloned().collect(),
            active_progress,
            recent_history: self.history(self.config.status_history_limit),
            config: self.config.clone(),
        }
    }

    /// The most recent `limit` finished batches, oldest first.
    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        let history = lock(&self.history);
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }
}

impl std::fmt::Debug for BatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCoordinator")
            .field("config", &self.config)
            .field("frameworks", &self.registry.names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator(config: BatchConfig) -> BatchCoordinator {
        BatchCoordinator::new(
            config,
            Arc::new(AnalyzerRegistry::new()),
            Arc::new(CacheManager::default()),
        )
    }

    #[test]
    fn validation_order_and_variants() {
        let coord = coordinator(BatchConfig {
            max_batch_size: 2,
            ..BatchConfig::default()
        });

        let blank = BatchRequest::new("  ", ["a"]);
        assert!(matches!(coord.validate(&blank), Err(HuginnError::InvalidBatchId)));

        let empty = BatchRequest::new("b", Vec::<String>::new());
        assert!(matches!(coord.validate(&empty), Err(HuginnError::EmptyBatch)));

        let large = BatchRequest::new("b", ["a", "b", "c"]);
        assert!(matches!(
            coord.validate(&large),
            Err(HuginnError::BatchTooLarge { size: 3, max: 2 })
        ));

        let zero = BatchRequest::new("b", ["a"]).concurrency(0);
        assert!(matches!(
            coord.validate(&zero),
            Err(HuginnError::InvalidConcurrency(0))
        ));

        assert_eq!(coord.validate(&BatchRequest::new("b", ["a"])).unwrap(), 4);
    }

    #[test]
    fn guard_releases_batch_id() {
        let coord = coordinator(BatchConfig::default());
        let job = || {
            Arc::new(JobHandle {
                cancel_requested: AtomicBool::new(false),
                progress: ProgressTracker::new("x", 1),
            })
        };
        {
            let _guard = coord.register("x", job()).unwrap();
            assert!(coord.is_active("x"));
            assert!(matches!(
                coord.register("x", job()),
                Err(HuginnError::DuplicateBatch(_))
            ));
        }
        assert!(!coord.is_active("x"));
    }

    #[test]
    fn history_is_bounded_ring() {
        let coord = coordinator(BatchConfig {
            history_limit: 2,
            ..BatchConfig::default()
        });
        for i in 0..3 {
            coord.record_history(HistoryEntry {
                batch_id: format!("b{i}"),
                timestamp: 0.0,
                status: BatchStatus::Completed,
                summary: BatchSummary::default(),
            });
        }
        let ids: Vec<String> = coord.history(10).into_iter().map(|h| h.batch_id).collect();
        assert_eq!(ids, vec!["b1", "b2"]);
        assert_eq!(coord.history(1)[0].batch_id, "b2");
    }
}
