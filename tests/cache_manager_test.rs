//! Tests for [`CacheManager`]: instance registry and cross-instance operations.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use huginn::HuginnError;
use huginn::cache::{CacheConfig, CacheManager};
use huginn::config::CacheSettings;

fn persistent_settings(dir: &tempfile::TempDir) -> CacheSettings {
    CacheSettings {
        persistence_enabled: true,
        persistence_dir: Some(dir.path().to_path_buf()),
        ..CacheSettings::default()
    }
}

// =========================================================================
// Registry
// =========================================================================

#[test]
fn get_or_create_returns_same_instance() {
    let manager = CacheManager::default();
    let first = manager.get_or_create("a", CacheConfig::new().max_size(3));
    let second = manager.get_or_create("a", CacheConfig::new().max_size(99));
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.max_size(), 3);
}

#[test]
fn create_replaces_instance() {
    let manager = CacheManager::default();
    let old = manager.create("a", CacheConfig::new().max_size(3));
    old.insert("k", json!(1));

    let new = manager.create("a", CacheConfig::new().max_size(5));
    assert!(!Arc::ptr_eq(&old, &new));
    assert!(new.is_empty());
    assert_eq!(manager.get("a").unwrap().max_size(), 5);
}

#[test]
fn get_unknown_instance_is_cache_not_found() {
    let manager = CacheManager::default();
    match manager.get("missing") {
        Err(HuginnError::CacheNotFound(name)) => assert_eq!(name, "missing"),
        other => panic!("expected CacheNotFound, got {other:?}"),
    }
}

#[test]
fn instance_uses_manager_settings() {
    let manager = CacheManager::new(CacheSettings {
        max_size: 12,
        ttl_secs: 30,
        ..CacheSettings::default()
    });
    let cache = manager.instance("scores");
    assert_eq!(cache.max_size(), 12);
    assert_eq!(cache.default_ttl(), Duration::from_secs(30));
    assert!(cache.persistence_path().is_none());
}

#[test]
fn list_and_remove() {
    let manager = CacheManager::default();
    manager.instance("zeta");
    manager.instance("alpha");
    assert_eq!(manager.list_instances(), vec!["alpha", "zeta"]);

    assert!(manager.remove("zeta"));
    assert!(!manager.remove("zeta"));
    assert_eq!(manager.list_instances(), vec!["alpha"]);
}

#[test]
fn instances_are_isolated() {
    let manager = CacheManager::default();
    let a = manager.instance("a");
    let b = manager.instance("b");
    a.insert("k", json!("from a"));
    assert!(b.get("k").is_none());
    assert_eq!(a.get("k"), Some(json!("from a")));
}

// =========================================================================
// Cross-instance maintenance
// =========================================================================

#[test]
fn cleanup_all_expired_reports_per_instance() {
    let manager = CacheManager::default();
    let a = manager.instance("a");
    let b = manager.instance("b");
    a.put("x", json!(1), &[], Some(Duration::ZERO));
    a.put("y", json!(2), &[], Some(Duration::ZERO));
    b.insert("z", json!(3));

    let removed = manager.cleanup_all_expired();
    assert_eq!(removed.get("a"), Some(&2));
    assert_eq!(removed.get("b"), Some(&0));
    assert_eq!(b.len(), 1);
}

#[test]
fn aggregate_stats_sums_instances() {
    let manager = CacheManager::default();
    let a = manager.instance("a");
    let b = manager.instance("b");
    a.insert("x", json!(1));
    b.insert("y", json!(2));
    b.insert("z", json!(3));
    a.get("x");
    b.get("nope");

    let stats = manager.aggregate_stats();
    assert_eq!(stats.instances.len(), 2);
    assert_eq!(stats.instances["b"].current_size, 2);
    assert_eq!(stats.totals.current_size, 3);
    assert_eq!(stats.totals.hits, 1);
    assert_eq!(stats.totals.misses, 1);
    assert_eq!(stats.totals.hit_ratio, 50.0);
}

#[test]
fn clear_all_empties_every_instance() {
    let manager = CacheManager::default();
    manager.instance("a").insert("x", json!(1));
    manager.instance("b").insert("y", json!(2));
    manager.clear_all();
    assert_eq!(manager.aggregate_stats().totals.current_size, 0);
    assert_eq!(manager.aggregate_stats().totals.evictions, 2);
}

// =========================================================================
// Persistence
// =========================================================================

#[test]
fn instance_snapshot_is_named_after_instance() {
    let dir = tempfile::tempdir().unwrap();
    let manager = CacheManager::new(persistent_settings(&dir));
    manager.instance("analysis").insert("k", json!(1));
    assert!(dir.path().join("analysis.json").exists());
}

#[test]
fn discover_persisted_opens_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    {
        let manager = CacheManager::new(persistent_settings(&dir));
        manager.instance("analysis").insert("k", json!(1));
        manager.instance("content").insert("c", json!(2));
        manager.shutdown();
    }
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let manager = CacheManager::new(CacheSettings {
        persistence_dir: Some(dir.path().to_path_buf()),
        ..CacheSettings::default()
    });
    let names = manager.discover_persisted().unwrap();
    assert_eq!(names, vec!["analysis", "content"]);
    assert_eq!(manager.get("analysis").unwrap().get("k"), Some(json!(1)));
    assert!(manager.get("content").unwrap().stats().persistence_enabled);
}

#[test]
fn discover_in_missing_directory_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let manager = CacheManager::new(CacheSettings {
        persistence_dir: Some(dir.path().join("absent")),
        ..CacheSettings::default()
    });
    assert!(manager.discover_persisted().unwrap().is_empty());
}

#[test]
fn shutdown_flushes_reads_into_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    {
        let manager = CacheManager::new(persistent_settings(&dir));
        let cache = manager.instance("analysis");
        cache.insert("k", json!(1));
        cache.get("k");
        manager.shutdown();
    }

    let manager = CacheManager::new(persistent_settings(&dir));
    let info = manager.instance("analysis").entries_info();
    assert_eq!(info[0].hit_count, 1);
}
