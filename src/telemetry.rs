//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `cache`: cache instance name (e.g. "analysis")
//! - `framework`: analyzer framework name (e.g. "STEPPS")
//! - `status`: outcome: "ok" / "error" for analyzer calls, the item
//!   outcome ("success", "failed", "cancelled", "timed_out") for batch items

/// Total cache hits.
///
/// Labels: `cache`.
pub const CACHE_HITS_TOTAL: &str = "huginn_cache_hits_total";

/// Total cache misses (including lookups of expired entries).
///
/// Labels: `cache`.
pub const CACHE_MISSES_TOTAL: &str = "huginn_cache_misses_total";

/// Total entries evicted to respect `max_size` (or dropped by `clear`).
///
/// Labels: `cache`.
pub const CACHE_EVICTIONS_TOTAL: &str = "huginn_cache_evictions_total";

/// Total entries removed because their TTL elapsed.
///
/// Labels: `cache`.
pub const CACHE_EXPIRED_TOTAL: &str = "huginn_cache_expired_total";

/// Total snapshot write/read failures.
///
/// Labels: `cache`.
pub const CACHE_PERSISTENCE_ERRORS_TOTAL: &str = "huginn_cache_persistence_errors_total";

/// Total analyzer invocations.
///
/// Labels: `framework`, `status` ("ok" | "error").
pub const ANALYZER_CALLS_TOTAL: &str = "huginn_analyzer_calls_total";

/// Analyzer call duration in seconds.
///
/// Labels: `framework`.
pub const ANALYZER_DURATION_SECONDS: &str = "huginn_analyzer_duration_seconds";

/// Total batch items reaching a terminal outcome.
///
/// Labels: `status`.
pub const BATCH_ITEMS_TOTAL: &str = "huginn_batch_items_total";

/// Wall-clock duration of a whole batch in seconds.
pub const BATCH_DURATION_SECONDS: &str = "huginn_batch_duration_seconds";
