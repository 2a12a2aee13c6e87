//! Registry of named cache instances.
//!
//! The manager is constructed once by the service and shared as an
//! `Arc<CacheManager>`. Instances are independent: each has its own lock,
//! capacity, TTL and snapshot file.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::entry::{percent_of, round2};
use super::instance::{CacheConfig, CacheInstance, CacheStats};
use crate::config::CacheSettings;
use crate::{HuginnError, Result};

/// Sums across every instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheTotals {
    pub instance_count: usize,
    pub hits: u64,
    pub misses: u64,
    /// Percentage over all instances, rounded to two decimals.
    pub hit_ratio: f64,
    pub evictions: u64,
    pub expired_removals: u64,
    pub current_size: usize,
    pub max_size: usize,
    /// `current_size` as a percentage of the summed `max_size`.
    pub utilization: f64,
    pub total_size_bytes: usize,
}

/// Per-instance statistics plus totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub instances: BTreeMap<String, CacheStats>,
    pub totals: CacheTotals,
}

impl AggregateStats {
    fn from_instances(instances: BTreeMap<String, CacheStats>) -> Self {
        let mut totals = CacheTotals {
            instance_count: instances.len(),
            ..CacheTotals::default()
        };
        for stats in instances.values() {
            totals.hits += stats.hits;
            totals.misses += stats.misses;
            totals.evictions += stats.evictions;
            totals.expired_removals += stats.expired_removals;
            totals.current_size += stats.current_size;
            totals.max_size += stats.max_size;
            totals.total_size_bytes += stats.total_size_bytes;
        }
        totals.utilization = percent_of(totals.current_size, totals.max_size);
        let lookups = totals.hits + totals.misses;
        if lookups > 0 {
            totals.hit_ratio = round2(totals.hits as f64 / lookups as f64 * 100.0);
        }
        Self { instances, totals }
    }
}

/// Name-keyed registry of [`CacheInstance`]s.
pub struct CacheManager {
    instances: RwLock<HashMap<String, Arc<CacheInstance>>>,
    settings: CacheSettings,
}

impl CacheManager {
    /// Create a manager whose [`instance`](Self::instance) shorthand builds
    /// instances from `settings`.
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
            settings,
        }
    }

    /// Settings used for instances created by name only.
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<CacheInstance>>> {
        self.instances.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<CacheInstance>>> {
        self.instances.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the instance called `name`, creating it from `config` if absent.
    ///
    /// An existing instance is returned unchanged; `config` is ignored then.
    pub fn get_or_create(&self, name: &str, config: CacheConfig) -> Arc<CacheInstance> {
        if let Some(instance) = self.read().get(name) {
            return Arc::clone(instance);
        }

        let mut instances = self.write();
        // Another caller may have created it between the two locks.
        if let Some(instance) = instances.get(name) {
            return Arc::clone(instance);
        }

        debug!(cache = name, max_size = config.max_size, "creating cache instance");
        let instance = Arc::new(CacheInstance::new(name, config));
        instances.insert(name.to_string(), Arc::clone(&instance));
        instance
    }

    /// [`get_or_create`](Self::get_or_create) with the manager's settings.
    pub fn instance(&self, name: &str) -> Arc<CacheInstance> {
        self.get_or_create(name, self.settings.instance_config(name))
    }

    /// Create (or replace) the instance called `name`.
    pub fn create(&self, name: &str, config: CacheConfig) -> Arc<CacheInstance> {
        let instance = Arc::new(CacheInstance::new(name, config));
        if self
            .write()
            .insert(name.to_string(), Arc::clone(&instance))
            .is_some()
        {
            debug!(cache = name, "replaced existing cache instance");
        }
        instance
    }

    /// Look up an existing instance.
    pub fn get(&self, name: &str) -> Result<Arc<CacheInstance>> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| HuginnError::CacheNotFound(name.to_string()))
    }

    /// Drop an instance from the registry. Its snapshot file is left alone.
    pub fn remove(&self, name: &str) -> bool {
        self.write().remove(name).is_some()
    }

    /// Registered instance names, sorted.
    pub fn list_instances(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn snapshot(&self) -> Vec<(String, Arc<CacheInstance>)> {
        self.read()
            .iter()
            .map(|(name, instance)| (name.clone(), Arc::clone(instance)))
            .collect()
    }

    /// Purge expired entries from every instance.
    pub fn cleanup_all_expired(&self) -> BTreeMap<String, usize> {
        self.snapshot()
            .into_iter()
            .map(|(name, instance)| {
                let removed = instance.cleanup_expired();
                (name, removed)
            })
            .collect()
    }

    /// Statistics for every instance plus totals.
    pub fn aggregate_stats(&self) -> AggregateStats {
        let instances = self
            .snapshot()
            .into_iter()
            .map(|(name, instance)| (name, instance.stats()))
            .collect();
        AggregateStats::from_instances(instances)
    }

    /// Clear every instance.
    pub fn clear_all(&self) {
        for (_, instance) in self.snapshot() {
            instance.clear();
        }
    }

    /// Open every `<name>.json` snapshot in the persistence directory.
    ///
    /// Discovered instances always persist back to their snapshot, even when
    /// persistence is disabled in the settings. Returns the names found,
    /// sorted; a missing directory yields an empty list.
    pub fn discover_persisted(&self) -> Result<Vec<String>> {
        let dir = self.settings.resolved_persistence_dir();
        let read_dir = match fs::read_dir(&dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(HuginnError::Persistence(format!(
                    "failed to scan {dir:?}: {e}"
                )));
            }
        };

        let mut names = Vec::new();
        for dir_entry in read_dir.flatten() {
            let path = dir_entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let config = self.settings.instance_config(name).persist_to(&path);
            self.get_or_create(name, config);
            names.push(name.to_string());
        }

        names.sort();
        info!(dir = %dir.display(), count = names.len(), "discovered persisted caches");
        Ok(names)
    }

    /// Flush every persisted instance. Failures are logged and skipped.
    pub fn shutdown(&self) {
        for (name, instance) in self.snapshot() {
            if instance.persistence_path().is_none() {
                continue;
            }
            if let Err(e) = instance.flush() {
                warn!(cache = %name, error = %e, "failed to flush cache on shutdown");
            }
        }
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("instances", &self.list_instances())
            .field("settings", &self.settings)
            .finish()
    }
}
