//! File-per-key JSON cache.
//!
//! Each entry lives in `{dir}/{sanitized key}.json` as
//! `{"ts": <unix seconds>, "data": <payload>}`. Stale files are left on
//! disk; they simply stop being served.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use tubelens_models::{Clock, SystemClock};

use crate::cache::{is_fresh, TtlCache};
use crate::error::{StorageError, StorageResult};
use crate::keys::sanitize_key;

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    ts: i64,
    #[serde(default)]
    data: Value,
}

/// Cache backed by one JSON file per key.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileCache {
    /// Open (and create if needed) a cache directory.
    pub fn new(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        Self::with_clock(dir, Arc::new(SystemClock))
    }

    pub fn with_clock(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            StorageError::config_error(format!(
                "Failed to create cache directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir, clock })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }

    fn read_entry(&self, path: &Path) -> Option<FileEntry> {
        let raw = fs::read_to_string(path).ok()?;
        match serde_json::from_str::<FileEntry>(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(path = ?path, error = %e, "Cache file is not a valid entry");
                None
            }
        }
    }
}

impl TtlCache for FileCache {
    fn get(&self, key: &str, ttl_secs: u64) -> Option<Value> {
        let path = self.path_for(key);
        let Some(entry) = self.read_entry(&path) else {
            metrics::counter!("tubelens_cache_requests_total", "backend" => "file", "result" => "miss")
                .increment(1);
            return None;
        };

        let stored_at = DateTime::<Utc>::from_timestamp(entry.ts, 0)?;
        if !is_fresh(stored_at, self.clock.now(), ttl_secs) || entry.data.is_null() {
            debug!(key = %key, "File cache entry expired");
            metrics::counter!("tubelens_cache_requests_total", "backend" => "file", "result" => "stale")
                .increment(1);
            return None;
        }

        debug!(key = %key, "File cache hit");
        metrics::counter!("tubelens_cache_requests_total", "backend" => "file", "result" => "hit")
            .increment(1);
        Some(entry.data)
    }

    fn set(&self, key: &str, value: &Value) -> StorageResult<()> {
        let path = self.path_for(key);
        let entry = FileEntry {
            ts: self.clock.now().timestamp(),
            data: value.clone(),
        };
        let payload = serde_json::to_string(&entry)?;

        fs::write(&path, payload).map_err(|e| {
            warn!(path = ?path, error = %e, "Failed to write cache file");
            StorageError::Io(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubelens_models::ManualClock;

    fn cache_with_clock() -> (tempfile::TempDir, FileCache, Arc<ManualClock>) {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::default());
        let cache = FileCache::with_clock(dir.path().join("cache"), clock.clone()).unwrap();
        (dir, cache, clock)
    }

    #[test]
    fn test_creates_directory() {
        let (_dir, cache, _clock) = cache_with_clock();
        assert!(cache.dir().is_dir());
    }

    #[test]
    fn test_path_is_sanitized() {
        let (_dir, cache, _clock) = cache_with_clock();
        let path = cache.path_for("search:q=a b/c");
        assert_eq!(path.file_name().unwrap(), "search:q_a_b_c.json");
    }

    #[test]
    fn test_set_overwrites_whole_entry() {
        let (_dir, cache, _clock) = cache_with_clock();
        cache.set("k", &serde_json::json!({"a": 1, "b": 2})).unwrap();
        cache.set("k", &serde_json::json!({"c": 3})).unwrap();
        assert_eq!(cache.get("k", 0), Some(serde_json::json!({"c": 3})));
    }

    #[test]
    fn test_corrupt_file_is_a_miss() {
        let (_dir, cache, _clock) = cache_with_clock();
        fs::write(cache.path_for("bad"), "{not json").unwrap();
        assert_eq!(cache.get("bad", 0), None);

        fs::write(cache.path_for("no-ts"), r#"{"data": {"a": 1}}"#).unwrap();
        assert_eq!(cache.get("no-ts", 0), None);
    }

    #[test]
    fn test_stale_file_stays_on_disk() {
        let (_dir, cache, clock) = cache_with_clock();
        cache.set("k", &serde_json::json!([1, 2])).unwrap();
        clock.advance_secs(120);
        assert_eq!(cache.get("k", 60), None);
        assert!(cache.path_for("k").exists());
    }
}
