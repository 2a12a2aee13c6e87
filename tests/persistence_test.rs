//! Tests for cache snapshot persistence across instance lifetimes.

use std::fs;
use std::time::Duration;

use serde_json::json;

use huginn::cache::persistence::{self, SNAPSHOT_VERSION};
use huginn::cache::{CacheConfig, CacheInstance};

fn persisted(dir: &tempfile::TempDir, max_size: usize) -> CacheInstance {
    CacheInstance::new(
        "analysis",
        CacheConfig::new()
            .max_size(max_size)
            .persist_to(dir.path().join("analysis.json")),
    )
}

#[test]
fn entries_survive_recreation() {
    let dir = tempfile::tempdir().unwrap();
    {
        let cache = persisted(&dir, 10);
        cache.put("a", json!({"score": 1}), &["STEPPS"], None);
        cache.put("b", json!({"score": 2}), &["IDEAL"], None);
        assert!(cache.stats().persistence_enabled);
    }

    let cache = persisted(&dir, 10);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("a"), Some(json!({"score": 1})));
    assert_eq!(cache.keys_for_tag("IDEAL"), vec!["b"]);
}

#[test]
fn recency_order_survives_recreation() {
    let dir = tempfile::tempdir().unwrap();
    {
        let cache = persisted(&dir, 10);
        cache.insert("a", json!(1));
        cache.insert("b", json!(2));
        cache.insert("c", json!(3));
        cache.get("a");
        // Reads are not written through; flush captures the new order.
        cache.flush().unwrap();
    }

    let cache = persisted(&dir, 10);
    let keys: Vec<String> = cache.entries_info().into_iter().map(|e| e.key).collect();
    assert_eq!(keys, vec!["a", "c", "b"]);
}

#[test]
fn load_keeps_most_recent_when_capacity_shrinks() {
    let dir = tempfile::tempdir().unwrap();
    {
        let cache = persisted(&dir, 10);
        for key in ["a", "b", "c", "d"] {
            cache.insert(key, json!(key));
        }
    }

    let cache = persisted(&dir, 2);
    assert_eq!(cache.len(), 2);
    assert!(cache.contains("c"));
    assert!(cache.contains("d"));
}

#[test]
fn expired_entries_not_restored() {
    let dir = tempfile::tempdir().unwrap();
    {
        let cache = persisted(&dir, 10);
        cache.put("short", json!(1), &[], Some(Duration::from_millis(30)));
        cache.insert("long", json!(2));
    }
    std::thread::sleep(Duration::from_millis(60));

    let cache = persisted(&dir, 10);
    assert!(!cache.contains("short"));
    assert!(cache.contains("long"));
}

#[test]
fn snapshot_format_is_versioned() {
    let dir = tempfile::tempdir().unwrap();
    let cache = persisted(&dir, 10);
    cache.put("a", json!(1), &["t"], None);

    let snapshot = persistence::read_snapshot(&dir.path().join("analysis.json"))
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    assert_eq!(snapshot.max_size, 10);
    assert_eq!(snapshot.entries.len(), 1);
    assert_eq!(snapshot.entries[0].tags, vec!["t".to_string()]);
    assert!(snapshot.written_by.starts_with(huginn::PKG_VERSION));
}

#[test]
fn missing_snapshot_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let cache = persisted(&dir, 10);
    assert!(cache.is_empty());
    assert!(cache.stats().persistence_enabled);
}

#[test]
fn corrupt_snapshot_starts_empty_and_is_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("analysis.json");
    fs::write(&path, "{ definitely not json").unwrap();

    let cache = persisted(&dir, 10);
    assert!(cache.is_empty());

    cache.insert("fresh", json!(true));
    let reloaded = persisted(&dir, 10);
    assert_eq!(reloaded.get("fresh"), Some(json!(true)));
}

#[test]
fn unknown_snapshot_version_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("analysis.json"),
        r#"{"version": 99, "saved_at": 0, "entries": []}"#,
    )
    .unwrap();
    assert!(persisted(&dir, 10).is_empty());
}

#[test]
fn unrepresentable_timestamps_are_skipped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs_f64();
    let snapshot = json!({
        "version": SNAPSHOT_VERSION,
        "saved_at": now,
        "entries": [
            {"key": "far", "value": 1, "created_at": 1e300, "ttl_secs": 60.0},
            {"key": "stale", "value": 2, "created_at": now, "ttl_secs": 60.0,
             "last_accessed": -1e300},
            {"key": "ok", "value": 3, "created_at": now, "ttl_secs": 60.0}
        ]
    });
    fs::write(
        dir.path().join("analysis.json"),
        serde_json::to_string(&snapshot).unwrap(),
    )
    .unwrap();

    let cache = persisted(&dir, 10);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("ok"), Some(json!(3)));
    assert!(!cache.contains("far"));
}

#[test]
fn removal_and_clear_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    {
        let cache = persisted(&dir, 10);
        cache.insert("a", json!(1));
        cache.insert("b", json!(2));
        cache.remove("a");
    }
    assert_eq!(persisted(&dir, 10).len(), 1);

    persisted(&dir, 10).clear();
    assert!(persisted(&dir, 10).is_empty());
}

#[test]
fn write_failure_keeps_memory_and_flush_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    // A file where the parent directory should be.
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "").unwrap();
    let cache = CacheInstance::new(
        "blocked",
        CacheConfig::new().persist_to(blocker.join("blocked.json")),
    );

    cache.insert("a", json!(1));
    assert_eq!(cache.get("a"), Some(json!(1)));
    assert!(!cache.stats().persistence_enabled);
    assert!(cache.flush().is_err());
}

#[test]
fn flush_reenables_persistence_after_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("later");
    fs::write(&target, "").unwrap();
    let cache = CacheInstance::new(
        "later",
        CacheConfig::new().persist_to(target.join("later.json")),
    );
    cache.insert("a", json!(1));
    assert!(!cache.stats().persistence_enabled);

    fs::remove_file(&target).unwrap();
    cache.flush().unwrap();
    assert!(cache.stats().persistence_enabled);
    assert!(target.join("later.json").exists());
}

#[test]
fn flush_without_persistence_is_noop() {
    let cache = CacheInstance::new("mem", CacheConfig::new());
    cache.insert("a", json!(1));
    cache.flush().unwrap();
}
