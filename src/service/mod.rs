//! The caller-facing facade.
//!
//! [`Huginn`] wires the cache manager, analyzer registry and batch
//! coordinator together and exposes the operations a transport layer would
//! map onto tools or endpoints. Every response type is `Serialize`.

mod builder;

pub use builder::HuginnBuilder;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::batch::{
    BatchCoordinator, BatchReport, BatchRequest, HistoryEntry, ItemInput, ProgressSnapshot,
};
use crate::cache::{CacheManager, CacheStats, CacheTotals, EntryInfo};
use crate::config::Config;
use crate::version;
use crate::{HuginnError, Result};

/// Entries listed by [`Huginn::get_cache_info`].
const ENTRY_DETAIL_LIMIT: usize = 10;

// ============================================================================
// Requests and responses
// ============================================================================

/// Wire form of a batch submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitBatchRequest {
    pub batch_id: String,
    pub items: Vec<ItemInput>,
    /// Frameworks for items that name none.
    #[serde(default)]
    pub frameworks: Option<Vec<String>>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
}

impl TryFrom<SubmitBatchRequest> for BatchRequest {
    type Error = HuginnError;

    fn try_from(request: SubmitBatchRequest) -> Result<Self> {
        let timeout = request
            .timeout_seconds
            .map(|secs| {
                Duration::try_from_secs_f64(secs).map_err(|_| {
                    HuginnError::InvalidInput(format!(
                        "timeout_seconds must be a non-negative number, got {secs}"
                    ))
                })
            })
            .transpose()?;

        Ok(BatchRequest {
            batch_id: request.batch_id,
            items: request.items,
            default_frameworks: request.frameworks,
            priority: request.priority,
            concurrency: request.concurrency,
            timeout,
        })
    }
}

/// Result of [`Huginn::submit_batch`].
pub type SubmitBatchResponse = BatchReport;

/// Coordinator limits reported alongside status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchLimits {
    pub max_batch_size: usize,
    pub workers: usize,
    pub timeout_seconds: u64,
}

/// Result of [`Huginn::get_batch_status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatusResponse {
    pub active_batch_ids: Vec<String>,
    pub active_progress: BTreeMap<String, ProgressSnapshot>,
    pub recent_history: Vec<HistoryEntry>,
    pub config: BatchLimits,
}

/// Result of [`Huginn::cancel_batch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelBatchResponse {
    pub batch_id: String,
    pub cancelled: bool,
    pub message: String,
}

/// Cache defaults reported by [`Huginn::get_cache_info`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettingsInfo {
    pub max_size: usize,
    pub ttl_seconds: u64,
    pub persistence_enabled: bool,
    pub persistence_dir: Option<String>,
}

/// Result of [`Huginn::get_cache_info`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheInfoResponse {
    pub per_instance_stats: BTreeMap<String, CacheStats>,
    pub totals: CacheTotals,
    /// Most recently used entries of the analysis cache.
    pub entry_details: Vec<EntryInfo>,
    /// Entries in the analysis cache, including those not listed.
    pub total_entries: usize,
    pub features: Vec<String>,
    pub config: CacheSettingsInfo,
    pub performance: CachePerformance,
    pub version: String,
}

/// Qualitative reading of the cache totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePerformance {
    /// `excellent`, `good`, `fair` or `poor`, by hit ratio.
    pub efficiency: String,
    /// `optimal`, `high` or `critical`, by utilization.
    pub memory_usage: String,
    /// Never empty.
    pub recommendations: Vec<String>,
}

impl CachePerformance {
    pub fn assess(totals: &CacheTotals) -> Self {
        let efficiency = match totals.hit_ratio {
            r if r >= 80.0 => "excellent",
            r if r >= 60.0 => "good",
            r if r >= 40.0 => "fair",
            _ => "poor",
        };
        let memory_usage = match totals.utilization {
            u if u <= 80.0 => "optimal",
            u if u <= 95.0 => "high",
            _ => "critical",
        };

        let mut recommendations = Vec::new();
        if totals.hit_ratio < 60.0 {
            recommendations.push("Consider increasing cache size for better hit ratio");
        }
        if totals.evictions as f64 > totals.hits as f64 * 0.1 {
            recommendations.push("High eviction rate detected - cache size may be too small");
        }
        if totals.utilization > 90.0 {
            recommendations.push("Cache utilization is high - monitor for performance impact");
        }
        if recommendations.is_empty() {
            recommendations.push("Cache performance is optimal");
        }

        Self {
            efficiency: efficiency.to_string(),
            memory_usage: memory_usage.to_string(),
            recommendations: recommendations.into_iter().map(String::from).collect(),
        }
    }
}

/// Result of [`Huginn::cleanup_expired_cache`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub per_instance_removed: BTreeMap<String, usize>,
    pub total_removed: usize,
    pub message: String,
}

// ============================================================================
// Facade
// ============================================================================

/// Batch analysis service.
///
/// ```rust,ignore
/// let huginn = Huginn::builder()
///     .config(Config::from_env()?)
///     .analyzer(Arc::new(MyStepps))
///     .build()?;
///
/// let report = huginn.submit_batch(request).await?;
/// huginn.shutdown();
/// ```
pub struct Huginn {
    config: Config,
    caches: Arc<CacheManager>,
    coordinator: BatchCoordinator,
}

impl Huginn {
    /// Create a new builder.
    pub fn builder() -> HuginnBuilder {
        HuginnBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache_manager(&self) -> &Arc<CacheManager> {
        &self.caches
    }

    pub fn coordinator(&self) -> &BatchCoordinator {
        &self.coordinator
    }

    /// Validate and run a batch to completion.
    pub async fn submit_batch(&self, request: SubmitBatchRequest) -> Result<SubmitBatchResponse> {
        let request = BatchRequest::try_from(request)?;
        self.coordinator.submit(request).await
    }

    /// Active batches and recent history.
    pub fn get_batch_status(&self) -> BatchStatusResponse {
        let status = self.coordinator.status();
        BatchStatusResponse {
            active_batch_ids: status.active_batch_ids,
            active_progress: status.active_progress,
            recent_history: status.recent_history,
            config: BatchLimits {
                max_batch_size: status.config.max_batch_size,
                workers: status.config.workers,
                timeout_seconds: status.config.timeout_secs,
            },
        }
    }

    /// Request cancellation. An unknown or finished batch is not an error.
    pub fn cancel_batch(&self, batch_id: &str) -> CancelBatchResponse {
        match self.coordinator.cancel(batch_id) {
            Ok(_) => CancelBatchResponse {
                batch_id: batch_id.to_string(),
                cancelled: true,
                message: format!("Batch {batch_id} cancelled successfully"),
            },
            Err(_) => CancelBatchResponse {
                batch_id: batch_id.to_string(),
                cancelled: false,
                message: format!("Batch {batch_id} was not found or already completed"),
            },
        }
    }

    /// Statistics for every cache plus detail on the analysis cache.
    pub fn get_cache_info(&self) -> CacheInfoResponse {
        let aggregate = self.caches.aggregate_stats();
        // Reporting must not create the analysis cache.
        let entries = self
            .caches
            .get(&self.config.batch.cache_name)
            .map(|analysis| analysis.entries_info())
            .unwrap_or_default();
        let settings = &self.config.cache;

        let mut features: Vec<String> = ["ttl_expiry", "lru_eviction", "tag_invalidation"]
            .into_iter()
            .map(String::from)
            .collect();
        if settings.persistence_enabled {
            features.push("persistence".to_string());
        }

        CacheInfoResponse {
            performance: CachePerformance::assess(&aggregate.totals),
            per_instance_stats: aggregate.instances,
            totals: aggregate.totals,
            total_entries: entries.len(),
            entry_details: entries.into_iter().take(ENTRY_DETAIL_LIMIT).collect(),
            features,
            config: CacheSettingsInfo {
                max_size: settings.max_size,
                ttl_seconds: settings.ttl_secs,
                persistence_enabled: settings.persistence_enabled,
                persistence_dir: settings
                    .persistence_enabled
                    .then(|| settings.resolved_persistence_dir().display().to_string()),
            },
            version: version::version_string(),
        }
    }

    /// Purge expired entries from every cache.
    pub fn cleanup_expired_cache(&self) -> CleanupResponse {
        let per_instance_removed = self.caches.cleanup_all_expired();
        let total_removed: usize = per_instance_removed.values().sum();
        info!(total_removed, "expired cache entries cleaned up");
        CleanupResponse {
            per_instance_removed,
            total_removed,
            message: format!("Cleaned up {total_removed} expired entries across all caches"),
        }
    }

    /// Flush persisted caches. Call once before exit.
    pub fn shutdown(&self) {
        info!("shutting down, flushing caches");
        self.caches.shutdown();
    }
}

impl std::fmt::Debug for Huginn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Huginn")
            .field("config", &self.config)
            .field("caches", &self.caches)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}
