//! Versioned on-disk snapshots of cache instances.
//!
//! A snapshot holds only live entries, ordered from least to most recently
//! used so that reloading restores the LRU order. Writes go to a sibling
//! temp file that is renamed over the target, so a crash mid-write leaves
//! the previous snapshot intact.
//!
//! ```json
//! {
//!   "version": 1,
//!   "saved_at": 1760000000.5,
//!   "written_by": "0.1.0+main.abc1234",
//!   "max_size": 50,
//!   "default_ttl_secs": 3600.0,
//!   "entries": [
//!     { "key": "…", "value": {}, "created_at": 1759999990.0,
//!       "ttl_secs": 3600.0, "tags": ["STEPPS"], "hit_count": 2,
//!       "last_accessed": 1759999995.0 }
//!   ]
//! }
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{HuginnError, Result};

/// Schema version written by this build.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Whole-instance snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Unix seconds.
    pub saved_at: f64,
    #[serde(default)]
    pub written_by: String,
    #[serde(default)]
    pub max_size: usize,
    #[serde(default)]
    pub default_ttl_secs: f64,
    pub entries: Vec<SnapshotEntry>,
}

/// One persisted entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub key: String,
    pub value: Value,
    /// Unix seconds.
    pub created_at: f64,
    pub ttl_secs: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub hit_count: u64,
    /// Unix seconds; defaults to `created_at`.
    #[serde(default)]
    pub last_accessed: Option<f64>,
}

/// Read a snapshot. `Ok(None)` when the file does not exist.
pub fn read_snapshot(path: &Path) -> Result<Option<Snapshot>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(HuginnError::Persistence(format!(
                "failed to read snapshot {path:?}: {e}"
            )));
        }
    };

    let snapshot: Snapshot = serde_json::from_str(&content).map_err(|e| {
        HuginnError::Persistence(format!("corrupt snapshot {path:?}: {e}"))
    })?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(HuginnError::Persistence(format!(
            "unsupported snapshot version {} in {path:?} (expected {SNAPSHOT_VERSION})",
            snapshot.version
        )));
    }

    Ok(Some(snapshot))
}

/// Write a snapshot atomically (temp file + rename).
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            HuginnError::Persistence(format!("failed to create directory {parent:?}: {e}"))
        })?;
    }

    let body = serde_json::to_vec_pretty(snapshot)?;
    let tmp = temp_path(path);
    fs::write(&tmp, body)
        .map_err(|e| HuginnError::Persistence(format!("failed to write {tmp:?}: {e}")))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        HuginnError::Persistence(format!("failed to replace snapshot {path:?}: {e}"))
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "snapshot".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: usize) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: 1.0,
            written_by: "test".into(),
            max_size: 10,
            default_ttl_secs: 60.0,
            entries: (0..entries)
                .map(|i| SnapshotEntry {
                    key: format!("k{i}"),
                    value: serde_json::json!(i),
                    created_at: 1.0,
                    ttl_secs: 60.0,
                    tags: vec![],
                    hit_count: 0,
                    last_accessed: None,
                })
                .collect(),
        }
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_snapshot(&dir.path().join("absent.json")).unwrap().is_none());
    }

    #[test]
    fn write_creates_parent_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        write_snapshot(&path, &snapshot(2)).unwrap();

        assert!(path.exists());
        assert!(!temp_path(&path).exists());
        let loaded = read_snapshot(&path).unwrap().unwrap();
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(loaded.entries[1].key, "k1");
    }

    #[test]
    fn corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ not json").unwrap();
        let err = read_snapshot(&path).unwrap_err();
        assert!(matches!(err, HuginnError::Persistence(_)));
    }

    #[test]
    fn unknown_version_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut snap = snapshot(0);
        snap.version = 99;
        fs::write(&path, serde_json::to_string(&snap).unwrap()).unwrap();
        let err = read_snapshot(&path).unwrap_err().to_string();
        assert!(err.contains("unsupported snapshot version"));
    }
}
