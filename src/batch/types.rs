//! Batch submission and result types.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analyzer::AnalysisReport;

// ============================================================================
// Submission
// ============================================================================

/// One item as submitted: bare text or a structured object.
///
/// ```json
/// ["plain text", {"id": "hero", "content": "…", "frameworks": ["STEPPS"], "priority": 5}]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemInput {
    Text(String),
    Structured(ItemSpec),
}

/// Structured item; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemSpec {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub frameworks: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub priority: Option<i64>,
}

impl From<&str> for ItemInput {
    fn from(text: &str) -> Self {
        ItemInput::Text(text.to_string())
    }
}

impl From<String> for ItemInput {
    fn from(text: String) -> Self {
        ItemInput::Text(text)
    }
}

impl From<ItemSpec> for ItemInput {
    fn from(spec: ItemSpec) -> Self {
        ItemInput::Structured(spec)
    }
}

/// A batch submission.
///
/// Only `batch_id` and `items` are required; the rest falls back to
/// [`BatchConfig`](crate::config::BatchConfig).
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    pub batch_id: String,
    pub items: Vec<ItemInput>,
    pub default_frameworks: Option<Vec<String>>,
    /// Priority for items that do not set one. Default: 0.
    pub priority: Option<i64>,
    pub concurrency: Option<usize>,
    pub timeout: Option<Duration>,
}

impl BatchRequest {
    pub fn new<I, T>(batch_id: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ItemInput>,
    {
        Self {
            batch_id: batch_id.into(),
            items: items.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn frameworks<I, S>(mut self, frameworks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_frameworks = Some(frameworks.into_iter().map(Into::into).collect());
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn concurrency(mut self, workers: usize) -> Self {
        self.concurrency = Some(workers);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A normalized unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub item_id: String,
    /// Position in the submission.
    pub index: usize,
    pub content: String,
    pub frameworks: Vec<String>,
    pub metadata: Value,
    /// Higher runs sooner.
    pub priority: i64,
}

impl BatchItem {
    /// Normalize a submitted item.
    ///
    /// Missing ids become `{batch_id}_item_{index}`; missing or empty
    /// framework lists take `frameworks`; missing priority takes `priority`.
    pub fn normalize(
        input: ItemInput,
        index: usize,
        batch_id: &str,
        frameworks: &[String],
        priority: i64,
    ) -> Self {
        let spec = match input {
            ItemInput::Text(content) => ItemSpec {
                content: Some(content),
                ..ItemSpec::default()
            },
            ItemInput::Structured(spec) => spec,
        };

        let mut item_frameworks = match spec.frameworks {
            Some(list) if !list.is_empty() => list,
            _ => frameworks.to_vec(),
        };
        dedup_in_order(&mut item_frameworks);

        Self {
            item_id: spec
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| format!("{batch_id}_item_{index}")),
            index,
            content: spec.content.unwrap_or_default(),
            frameworks: item_frameworks,
            metadata: spec
                .metadata
                .unwrap_or_else(|| Value::Object(Default::default())),
            priority: spec.priority.unwrap_or(priority),
        }
    }
}

fn dedup_in_order(names: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    names.retain(|name| seen.insert(name.clone()));
}

// ============================================================================
// Results
// ============================================================================

/// How an item ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Success { report: AnalysisReport },
    Failed { error: String },
    Cancelled,
    TimedOut,
}

impl ItemOutcome {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Success { .. } => "success",
            ItemOutcome::Failed { .. } => "failed",
            ItemOutcome::Cancelled => "cancelled",
            ItemOutcome::TimedOut => "timed_out",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Success { .. })
    }
}

/// The single, immutable result of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub item_id: String,
    pub index: usize,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
    pub processing_time_ms: f64,
    pub framework_count: usize,
    /// Served from the analysis cache.
    pub cached: bool,
}

impl ItemResult {
    /// Result for an item that never started.
    pub(crate) fn skipped(item: &BatchItem, outcome: ItemOutcome) -> Self {
        Self {
            item_id: item.item_id.clone(),
            index: item.index,
            outcome,
            processing_time_ms: 0.0,
            framework_count: item.frameworks.len(),
            cached: false,
        }
    }
}

/// Lifecycle state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Running,
    Completed,
    Cancelled,
    TimedOut,
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Running => "running",
            BatchStatus::Completed => "completed",
            BatchStatus::Cancelled => "cancelled",
            BatchStatus::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}

/// Aggregate figures for a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_items: usize,
    pub successful_items: usize,
    pub failed_items: usize,
    pub cancelled_items: usize,
    pub timed_out_items: usize,
    pub cache_hits: usize,
    /// Percent, two decimals.
    pub success_rate: f64,
    /// Wall clock for the whole batch.
    pub total_processing_time_secs: f64,
    /// Mean over items that actually ran.
    pub average_processing_time_ms: f64,
    /// Frameworks applied by successful items.
    pub total_frameworks_processed: usize,
    pub throughput_items_per_second: f64,
}

impl BatchSummary {
    /// Summarize `results` for a batch that took `elapsed`.
    pub fn from_results(results: &[ItemResult], elapsed: Duration) -> Self {
        let mut summary = BatchSummary {
            total_items: results.len(),
            ..Self::default()
        };

        let mut timed_ms = Vec::new();
        for result in results {
            match result.outcome {
                ItemOutcome::Success { .. } => {
                    summary.successful_items += 1;
                    summary.total_frameworks_processed += result.framework_count;
                }
                ItemOutcome::Failed { .. } => summary.failed_items += 1,
                ItemOutcome::Cancelled => summary.cancelled_items += 1,
                ItemOutcome::TimedOut => summary.timed_out_items += 1,
            }
            if result.cached {
                summary.cache_hits += 1;
            }
            if result.processing_time_ms > 0.0 {
                timed_ms.push(result.processing_time_ms);
            }
        }

        let secs = elapsed.as_secs_f64();
        summary.total_processing_time_secs = round3(secs);
        if summary.total_items > 0 {
            summary.success_rate =
                round2(summary.successful_items as f64 / summary.total_items as f64 * 100.0);
        }
        if !timed_ms.is_empty() {
            summary.average_processing_time_ms =
                round2(timed_ms.iter().sum::<f64>() / timed_ms.len() as f64);
        }
        if secs > 0.0 {
            summary.throughput_items_per_second = round2(summary.total_items as f64 / secs);
        }
        summary
    }
}

/// Everything a caller gets back from a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: String,
    pub status: BatchStatus,
    /// In submission order.
    pub results: Vec<ItemResult>,
    pub summary: BatchSummary,
}

/// A finished batch as kept in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub batch_id: String,
    /// Unix seconds at completion.
    pub timestamp: f64,
    pub status: BatchStatus,
    pub summary: BatchSummary,
}

impl HistoryEntry {
    pub(crate) fn now(report: &BatchReport) -> Self {
        Self {
            batch_id: report.batch_id.clone(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
            status: report.status,
            summary: report.summary.clone(),
        }
    }
}

/// Acknowledgement of a cancellation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelAck {
    pub batch_id: String,
    /// Cancellation had already been requested for this batch.
    pub already_requested: bool,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
