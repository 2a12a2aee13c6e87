//! Caching subsystem.
//!
//! - [`CacheInstance`]: one bounded store with TTL expiry, strict LRU
//!   eviction, tag invalidation and optional on-disk snapshots.
//! - [`CacheManager`]: registry of named instances with cross-instance
//!   cleanup, aggregated statistics, snapshot discovery and a shutdown flush.
//! - [`key::analysis_key`]: content-addressed keys for analysis reports.
//! - [`persistence`]: the versioned snapshot format.

mod entry;
mod instance;
pub mod key;
mod manager;
pub mod persistence;

pub use entry::{CacheEntry, EntryInfo};
pub use instance::{CacheConfig, CacheInstance, CacheStats};
pub use manager::{AggregateStats, CacheManager, CacheTotals};
