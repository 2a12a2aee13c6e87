//! Cache entries and their time bookkeeping.

use std::collections::BTreeSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single stored value with its expiry and access metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub created_at: SystemTime,
    pub ttl: Duration,
    pub tags: BTreeSet<String>,
    /// Serialized JSON length of `value`.
    pub size_bytes: usize,
    pub last_accessed: SystemTime,
    pub hit_count: u64,
    /// Recency tick; the smallest live tick is the LRU victim.
    pub(crate) position: u64,
}

impl CacheEntry {
    pub(crate) fn new(
        key: String,
        value: Value,
        ttl: Duration,
        tags: BTreeSet<String>,
        now: SystemTime,
    ) -> Self {
        let size_bytes = estimate_size(&value);
        Self {
            key,
            value,
            created_at: now,
            ttl,
            tags,
            size_bytes,
            last_accessed: now,
            hit_count: 0,
            position: 0,
        }
    }

    /// Live iff `now < created_at + ttl`.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        age_at(self.created_at, now) >= self.ttl
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }

    /// Time elapsed since creation (zero if the clock moved backwards).
    pub fn age_at(&self, now: SystemTime) -> Duration {
        age_at(self.created_at, now)
    }

    pub(crate) fn touch(&mut self, now: SystemTime) {
        self.last_accessed = now;
        self.hit_count += 1;
    }

    pub(crate) fn info(&self, now: SystemTime) -> EntryInfo {
        EntryInfo {
            key: self.key.clone(),
            created_at: unix_secs(self.created_at),
            last_accessed: unix_secs(self.last_accessed),
            age_secs: round2(self.age_at(now).as_secs_f64()),
            ttl_secs: self.ttl.as_secs_f64(),
            hit_count: self.hit_count,
            size_bytes: self.size_bytes,
            tags: self.tags.iter().cloned().collect(),
            expired: self.is_expired_at(now),
        }
    }
}

/// Read-only view of an entry for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub key: String,
    /// Unix seconds.
    pub created_at: f64,
    /// Unix seconds.
    pub last_accessed: f64,
    pub age_secs: f64,
    pub ttl_secs: f64,
    pub hit_count: u64,
    pub size_bytes: usize,
    pub tags: Vec<String>,
    pub expired: bool,
}

fn estimate_size(value: &Value) -> usize {
    serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
}

fn age_at(created_at: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(created_at).unwrap_or(Duration::ZERO)
}

pub(crate) fn unix_secs(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// `None` for negative, non-finite or unrepresentable timestamps.
pub(crate) fn from_unix_secs(secs: f64) -> Option<SystemTime> {
    let offset = Duration::try_from_secs_f64(secs).ok()?;
    UNIX_EPOCH.checked_add(offset)
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// `part` as a percentage of `whole`, rounded to two decimals. Zero when `whole` is zero.
pub(crate) fn percent_of(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}
