//! A single bounded cache instance: TTL expiry, strict LRU eviction, a tag
//! index and optional snapshot persistence.
//!
//! # Locking
//!
//! All state lives behind one `Mutex`. Every structural operation takes it,
//! including [`CacheInstance::get`], which moves the entry to the most
//! recently used position. Instances never share locks with each other.
//!
//! # Recency
//!
//! Each entry carries a monotonically increasing tick; the `recency` map
//! orders ticks, so its first key is always the LRU victim. Because ticks
//! never repeat, entries that were never read are evicted in insertion order.
//!
//! # Persistence
//!
//! When a persistence path is configured the instance loads the snapshot on
//! construction and rewrites it after every mutation. Any I/O failure is
//! logged, counted, and switches the instance to memory-only mode; the
//! in-memory operation that triggered it still succeeds.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::entry::{CacheEntry, EntryInfo, from_unix_secs, percent_of, round2, unix_secs};
use super::persistence::{self, SNAPSHOT_VERSION, Snapshot, SnapshotEntry};
use crate::telemetry;
use crate::version;
use crate::Result;

/// Configuration for one cache instance.
///
/// ```rust
/// # use huginn::cache::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_size(500)
///     .ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of live entries. Default: 50.
    pub max_size: usize,
    /// TTL applied when `put` is not given one. Default: 1 hour.
    pub default_ttl: Duration,
    /// Snapshot file; `None` keeps the instance memory-only.
    pub persistence_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 50,
            default_ttl: Duration::from_secs(3600),
            persistence_path: None,
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries.
    pub fn max_size(mut self, n: usize) -> Self {
        self.max_size = n;
        self
    }

    /// Set the default time-to-live.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Mirror the instance to a snapshot file.
    pub fn persist_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.persistence_path = Some(path.into());
        self
    }
}

/// Point-in-time statistics for one instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Percentage of lookups that hit, rounded to two decimals.
    pub hit_ratio: f64,
    pub evictions: u64,
    pub expired_removals: u64,
    pub current_size: usize,
    pub max_size: usize,
    /// `current_size` as a percentage of `max_size`, rounded to two decimals.
    pub utilization: f64,
    pub total_size_bytes: usize,
    pub avg_access_time_ms: f64,
    pub default_ttl_secs: f64,
    /// False when unconfigured or after a persistence failure.
    pub persistence_enabled: bool,
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
    expired_removals: u64,
    /// Running mean over every `get`, in milliseconds.
    avg_access_ms: f64,
}

#[derive(Debug, Default)]
struct Store {
    entries: HashMap<String, CacheEntry>,
    recency: BTreeMap<u64, String>,
    tags: HashMap<String, HashSet<String>>,
    next_tick: u64,
    counters: Counters,
    /// Set after a persistence failure; the instance stays memory-only.
    degraded: bool,
}

impl Store {
    fn tick(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn insert(&mut self, mut entry: CacheEntry) {
        self.remove(&entry.key);
        entry.position = self.tick();
        self.recency.insert(entry.position, entry.key.clone());
        for tag in &entry.tags {
            self.tags
                .entry(tag.clone())
                .or_default()
                .insert(entry.key.clone());
        }
        self.entries.insert(entry.key.clone(), entry);
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.position);
        for tag in &entry.tags {
            if let Some(keys) = self.tags.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tags.remove(tag);
                }
            }
        }
        Some(entry)
    }

    fn promote(&mut self, key: &str) {
        let tick = self.tick();
        if let Some(entry) = self.entries.get_mut(key) {
            self.recency.remove(&entry.position);
            entry.position = tick;
            self.recency.insert(tick, key.to_string());
        }
    }

    fn pop_lru(&mut self) -> Option<CacheEntry> {
        let key = self.recency.values().next()?.clone();
        self.remove(&key)
    }

    fn record_access(&mut self, elapsed: Duration) {
        let c = &mut self.counters;
        let total = (c.hits + c.misses).max(1) as f64;
        let sample = elapsed.as_secs_f64() * 1000.0;
        c.avg_access_ms += (sample - c.avg_access_ms) / total;
    }

    fn expired_keys(&self, now: SystemTime) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| e.is_expired_at(now))
            .map(|e| e.key.clone())
            .collect()
    }

    /// Entries from least to most recently used.
    fn ordered(&self) -> impl Iterator<Item = &CacheEntry> {
        self.recency.values().filter_map(|k| self.entries.get(k))
    }
}

/// One independently configured, independently locked key/value store.
pub struct CacheInstance {
    name: String,
    max_size: usize,
    default_ttl: Duration,
    persistence_path: Option<PathBuf>,
    store: Mutex<Store>,
}

impl CacheInstance {
    /// Create an instance, loading its snapshot when persistence is
    /// configured. Missing, unreadable or corrupt snapshots yield an empty
    /// cache; construction never fails.
    pub fn new(name: impl Into<String>, config: CacheConfig) -> Self {
        let name = name.into();
        let mut store = Store::default();

        if let Some(ref path) = config.persistence_path {
            restore(&name, path, &config, &mut store);
        }

        Self {
            name,
            max_size: config.max_size,
            default_ttl: config.default_ttl,
            persistence_path: config.persistence_path,
            store: Mutex::new(store),
        }
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured capacity.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// TTL used when `put` is not given one.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Snapshot location, if persistence is configured.
    pub fn persistence_path(&self) -> Option<&Path> {
        self.persistence_path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        // Every mutation leaves the store consistent before any call that
        // could panic, so a poisoned lock still guards valid state.
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a live value.
    ///
    /// An expired entry is removed, counted as an expired removal and
    /// reported as a miss. A hit moves the entry to the most recently used
    /// position.
    pub fn get(&self, key: &str) -> Option<Value> {
        let started = Instant::now();
        let now = SystemTime::now();
        let mut store = self.lock();

        let expired = match store.entries.get(key) {
            None => None,
            Some(entry) => Some(entry.is_expired_at(now)),
        };

        let result = match expired {
            None => {
                store.counters.misses += 1;
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => self.name.clone())
                    .increment(1);
                None
            }
            Some(true) => {
                store.remove(key);
                store.counters.misses += 1;
                store.counters.expired_removals += 1;
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => self.name.clone())
                    .increment(1);
                metrics::counter!(telemetry::CACHE_EXPIRED_TOTAL, "cache" => self.name.clone())
                    .increment(1);
                debug!(cache = %self.name, key, "expired entry removed on access");
                None
            }
            Some(false) => {
                store.promote(key);
                store.counters.hits += 1;
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => self.name.clone())
                    .increment(1);
                store.entries.get_mut(key).map(|entry| {
                    entry.touch(now);
                    entry.value.clone()
                })
            }
        };

        store.record_access(started.elapsed());
        result
    }

    /// Whether a live entry exists. Does not touch statistics or recency.
    pub fn contains(&self, key: &str) -> bool {
        let now = SystemTime::now();
        self.lock()
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired_at(now))
    }

    /// Insert with the default TTL and no tags.
    pub fn insert(&self, key: &str, value: Value) {
        self.put(key, value, &[], None);
    }

    /// Insert or replace an entry.
    ///
    /// Evicts least recently used entries until the instance is back within
    /// `max_size`, indexes `tags`, and mirrors the change to disk when
    /// persistence is enabled.
    pub fn put(&self, key: &str, value: Value, tags: &[&str], ttl: Option<Duration>) {
        let now = SystemTime::now();
        let tags: BTreeSet<String> = tags.iter().map(|t| t.to_string()).collect();
        let entry = CacheEntry::new(
            key.to_string(),
            value,
            ttl.unwrap_or(self.default_ttl),
            tags,
            now,
        );

        let mut store = self.lock();
        store.insert(entry);

        let mut evicted = 0u64;
        while store.entries.len() > self.max_size {
            match store.pop_lru() {
                Some(victim) => {
                    debug!(cache = %self.name, key = %victim.key, "evicted least recently used entry");
                    evicted += 1;
                }
                None => break,
            }
        }
        if evicted > 0 {
            store.counters.evictions += evicted;
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "cache" => self.name.clone())
                .increment(evicted);
        }

        self.persist(&mut store);
    }

    /// Remove a single key. Returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        let mut store = self.lock();
        let removed = store.remove(key).is_some();
        if removed {
            self.persist(&mut store);
        }
        removed
    }

    /// Remove every entry carrying at least one of `tags`.
    pub fn invalidate_by_tags(&self, tags: &[&str]) -> usize {
        let mut store = self.lock();
        let keys: HashSet<String> = tags
            .iter()
            .filter_map(|tag| store.tags.get(*tag))
            .flat_map(|keys| keys.iter().cloned())
            .collect();

        let removed = keys
            .iter()
            .filter(|key| store.remove(key).is_some())
            .count();

        if removed > 0 {
            debug!(cache = %self.name, removed, ?tags, "invalidated entries by tag");
            self.persist(&mut store);
        }
        removed
    }

    /// Proactively remove every expired entry.
    pub fn cleanup_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut store = self.lock();
        let keys = store.expired_keys(now);
        for key in &keys {
            store.remove(key);
        }

        let removed = keys.len();
        if removed > 0 {
            store.counters.expired_removals += removed as u64;
            metrics::counter!(telemetry::CACHE_EXPIRED_TOTAL, "cache" => self.name.clone())
                .increment(removed as u64);
            self.persist(&mut store);
        }
        removed
    }

    /// Drop every entry. Dropped entries count as evictions.
    pub fn clear(&self) {
        let mut store = self.lock();
        let dropped = store.entries.len() as u64;
        store.entries.clear();
        store.recency.clear();
        store.tags.clear();
        store.counters.evictions += dropped;
        if dropped > 0 {
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "cache" => self.name.clone())
                .increment(dropped);
        }
        self.persist(&mut store);
    }

    /// Number of stored entries (expired entries not yet removed included).
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the instance holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys currently indexed under `tag`.
    pub fn keys_for_tag(&self, tag: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .lock()
            .tags
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        let store = self.lock();
        let c = &store.counters;
        let lookups = c.hits + c.misses;
        let hit_ratio = if lookups > 0 {
            c.hits as f64 / lookups as f64 * 100.0
        } else {
            0.0
        };

        CacheStats {
            hits: c.hits,
            misses: c.misses,
            hit_ratio: round2(hit_ratio),
            evictions: c.evictions,
            expired_removals: c.expired_removals,
            current_size: store.entries.len(),
            max_size: self.max_size,
            utilization: percent_of(store.entries.len(), self.max_size),
            total_size_bytes: store.entries.values().map(|e| e.size_bytes).sum(),
            avg_access_time_ms: (c.avg_access_ms * 1000.0).round() / 1000.0,
            default_ttl_secs: self.default_ttl.as_secs_f64(),
            persistence_enabled: self.persistence_path.is_some() && !store.degraded,
        }
    }

    /// Per-entry diagnostics, most recently used first.
    pub fn entries_info(&self) -> Vec<EntryInfo> {
        let now = SystemTime::now();
        let store = self.lock();
        let mut infos: Vec<EntryInfo> = store.ordered().map(|e| e.info(now)).collect();
        infos.reverse();
        infos
    }

    /// Write the snapshot now, regardless of an earlier failure.
    ///
    /// A successful flush re-enables persistence. Used at shutdown.
    pub fn flush(&self) -> Result<()> {
        let Some(ref path) = self.persistence_path else {
            return Ok(());
        };
        let mut store = self.lock();
        let snapshot = self.snapshot(&store);
        persistence::write_snapshot(path, &snapshot)?;
        store.degraded = false;
        Ok(())
    }

    fn persist(&self, store: &mut Store) {
        let Some(ref path) = self.persistence_path else {
            return;
        };
        if store.degraded {
            return;
        }
        let snapshot = self.snapshot(store);
        if let Err(e) = persistence::write_snapshot(path, &snapshot) {
            warn!(
                cache = %self.name,
                path = %path.display(),
                error = %e,
                "cache persistence failed, continuing in memory-only mode"
            );
            metrics::counter!(telemetry::CACHE_PERSISTENCE_ERRORS_TOTAL, "cache" => self.name.clone())
                .increment(1);
            store.degraded = true;
        }
    }

    fn snapshot(&self, store: &Store) -> Snapshot {
        let now = SystemTime::now();
        Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: unix_secs(now),
            written_by: version::version_string(),
            max_size: self.max_size,
            default_ttl_secs: self.default_ttl.as_secs_f64(),
            entries: store
                .ordered()
                .filter(|e| !e.is_expired_at(now))
                .map(|e| SnapshotEntry {
                    key: e.key.clone(),
                    value: e.value.clone(),
                    created_at: unix_secs(e.created_at),
                    ttl_secs: e.ttl.as_secs_f64(),
                    tags: e.tags.iter().cloned().collect(),
                    hit_count: e.hit_count,
                    last_accessed: Some(unix_secs(e.last_accessed)),
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for CacheInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheInstance")
            .field("name", &self.name)
            .field("max_size", &self.max_size)
            .field("default_ttl", &self.default_ttl)
            .field("persistence_path", &self.persistence_path)
            .finish_non_exhaustive()
    }
}

/// Load the snapshot at `path` into `store`, keeping the `max_size` most
/// recently used live entries.
fn restore(name: &str, path: &Path, config: &CacheConfig, store: &mut Store) {
    let snapshot = match persistence::read_snapshot(path) {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            debug!(cache = name, path = %path.display(), "no cache snapshot, starting empty");
            return;
        }
        Err(e) => {
            warn!(cache = name, error = %e, "ignoring unreadable cache snapshot, starting empty");
            metrics::counter!(telemetry::CACHE_PERSISTENCE_ERRORS_TOTAL, "cache" => name.to_string())
                .increment(1);
            return;
        }
    };

    let now = SystemTime::now();
    let live: Vec<CacheEntry> = snapshot
        .entries
        .into_iter()
        .filter_map(|s| {
            let ttl = Duration::try_from_secs_f64(s.ttl_secs).ok()?;
            let created_at = from_unix_secs(s.created_at)?;
            let last_accessed = match s.last_accessed {
                Some(secs) => from_unix_secs(secs)?,
                None => created_at,
            };
            let mut entry =
                CacheEntry::new(s.key, s.value, ttl, s.tags.into_iter().collect(), created_at);
            entry.hit_count = s.hit_count;
            entry.last_accessed = last_accessed;
            (!entry.is_expired_at(now)).then_some(entry)
        })
        .collect();

    let skip = live.len().saturating_sub(config.max_size);
    for entry in live.into_iter().skip(skip) {
        store.insert(entry);
    }
    debug!(cache = name, loaded = store.entries.len(), "restored cache snapshot");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instance(max: usize) -> CacheInstance {
        CacheInstance::new("test", CacheConfig::new().max_size(max))
    }

    #[test]
    fn recency_and_tag_indexes_track_entries() {
        let cache = instance(10);
        cache.put("a", json!(1), &["x", "y"], None);
        cache.put("b", json!(2), &["y"], None);
        cache.put("a", json!(3), &["z"], None);

        let store = cache.lock();
        assert_eq!(store.entries.len(), 2);
        assert_eq!(store.recency.len(), 2);
        assert!(!store.tags.contains_key("x"));
        assert_eq!(store.tags["y"].len(), 1);
        assert!(store.tags["z"].contains("a"));
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let cache = instance(0);
        cache.insert("a", json!(1));
        assert!(cache.is_empty());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn unknown_tag_invalidates_nothing() {
        let cache = instance(10);
        cache.put("a", json!(1), &["x"], None);
        assert_eq!(cache.invalidate_by_tags(&["nope"]), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn entry_with_overlapping_tags_counted_once() {
        let cache = instance(10);
        cache.put("a", json!(1), &["x", "y"], None);
        assert_eq!(cache.invalidate_by_tags(&["x", "y"]), 1);
        assert!(cache.lock().tags.is_empty());
    }

    #[test]
    fn persistence_failure_degrades_to_memory_only() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the snapshot file should be makes rename fail.
        let path = dir.path().join("blocked.json");
        std::fs::create_dir(&path).unwrap();

        let cache = CacheInstance::new("blocked", CacheConfig::new().persist_to(&path));
        cache.insert("a", json!(1));

        assert_eq!(cache.get("a"), Some(json!(1)));
        assert!(!cache.stats().persistence_enabled);
    }
}
