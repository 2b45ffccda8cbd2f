//! Row-per-key SQLite cache.
//!
//! Same read/write contract as [`FileCache`](crate::FileCache), plus
//! bookkeeping columns (`hit_count`, `last_accessed`) that never affect
//! what `get` returns. `expires_at` is written from the cache's default
//! TTL and is only consulted by [`SqliteCache::cleanup_expired`].

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use tubelens_models::{Clock, SystemClock};

use crate::cache::{is_fresh, TtlCache};
use crate::error::StorageResult;

/// Default lifetime used for `expires_at` (6 hours).
pub const DEFAULT_TTL_SECS: u64 = 21_600;

/// Aggregate numbers for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: u64,
    pub expired_entries: u64,
    pub total_hits: u64,
    /// Most-read keys with their hit counts, highest first
    pub top_hits: Vec<(String, u64)>,
}

/// Cache backed by one SQLite row per key.
pub struct SqliteCache {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    default_ttl_secs: u64,
}

impl SqliteCache {
    /// Open (and migrate) a database file.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::from_connection(Connection::open(path)?, Arc::new(SystemClock))
    }

    /// Private in-memory database.
    pub fn in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, Arc::new(SystemClock))
    }

    pub fn from_connection(conn: Connection, clock: Arc<dyn Clock>) -> StorageResult<Self> {
        let cache = Self {
            conn: Mutex::new(conn),
            clock,
            default_ttl_secs: DEFAULT_TTL_SECS,
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_default_ttl(mut self, ttl_secs: u64) -> Self {
        self.default_ttl_secs = ttl_secs;
        self
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn initialize_schema(&self) -> StorageResult<()> {
        let conn = self.conn();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS api_cache (
                cache_key TEXT PRIMARY KEY,
                response_data TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                last_accessed INTEGER NOT NULL,
                hit_count INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_api_cache_expires_at ON api_cache (expires_at)",
            [],
        )?;
        Ok(())
    }

    fn now_ts(&self) -> i64 {
        self.clock.now().timestamp()
    }

    fn try_get(&self, key: &str, ttl_secs: u64) -> StorageResult<Option<Value>> {
        let conn = self.conn();
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT response_data, created_at FROM api_cache WHERE cache_key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((data, created_at)) = row else {
            return Ok(None);
        };

        let Some(stored_at) = DateTime::<Utc>::from_timestamp(created_at, 0) else {
            return Ok(None);
        };
        if !is_fresh(stored_at, self.clock.now(), ttl_secs) {
            debug!(key = %key, "SQLite cache entry expired");
            return Ok(None);
        }

        let value: Value = match serde_json::from_str(&data) {
            Ok(value) => value,
            Err(e) => {
                debug!(key = %key, error = %e, "SQLite cache row is not valid JSON");
                return Ok(None);
            }
        };

        conn.execute(
            "UPDATE api_cache SET hit_count = hit_count + 1, last_accessed = ?2 WHERE cache_key = ?1",
            params![key, self.now_ts()],
        )?;

        Ok(Some(value))
    }

    /// Remove one entry. Returns whether a row was deleted.
    pub fn delete(&self, key: &str) -> StorageResult<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM api_cache WHERE cache_key = ?1", params![key])?;
        Ok(deleted > 0)
    }

    /// Delete rows whose `expires_at` has passed.
    pub fn cleanup_expired(&self) -> StorageResult<usize> {
        let deleted = self.conn().execute(
            "DELETE FROM api_cache WHERE expires_at < ?1",
            params![self.now_ts()],
        )?;
        info!(deleted = deleted, "Cleaned up expired cache rows");
        Ok(deleted)
    }

    /// Delete every row.
    pub fn clear_all(&self) -> StorageResult<usize> {
        Ok(self.conn().execute("DELETE FROM api_cache", [])?)
    }

    /// Hit count of one entry, if present.
    pub fn hit_count(&self, key: &str) -> StorageResult<Option<u64>> {
        let count: Option<i64> = self
            .conn()
            .query_row(
                "SELECT hit_count FROM api_cache WHERE cache_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.map(|c| c.max(0) as u64))
    }

    pub fn stats(&self) -> StorageResult<CacheStats> {
        let now = self.now_ts();
        let conn = self.conn();

        let (total, hits): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(hit_count), 0) FROM api_cache",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let expired: i64 = conn.query_row(
            "SELECT COUNT(*) FROM api_cache WHERE expires_at < ?1",
            params![now],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT cache_key, hit_count FROM api_cache ORDER BY hit_count DESC, cache_key LIMIT 10",
        )?;
        let top_hits = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.max(0) as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CacheStats {
            total_entries: total.max(0) as u64,
            expired_entries: expired.max(0) as u64,
            total_hits: hits.max(0) as u64,
            top_hits,
        })
    }
}

impl TtlCache for SqliteCache {
    fn get(&self, key: &str, ttl_secs: u64) -> Option<Value> {
        match self.try_get(key, ttl_secs) {
            Ok(Some(value)) => {
                debug!(key = %key, "SQLite cache hit");
                metrics::counter!("tubelens_cache_requests_total", "backend" => "sqlite", "result" => "hit")
                    .increment(1);
                Some(value)
            }
            Ok(None) => {
                metrics::counter!("tubelens_cache_requests_total", "backend" => "sqlite", "result" => "miss")
                    .increment(1);
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "SQLite cache read failed, treating as miss");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &Value) -> StorageResult<()> {
        let now = self.now_ts();
        let expires_at = expires_at(now, self.default_ttl_secs);
        let data = serde_json::to_string(value)?;

        self.conn().execute(
            "INSERT INTO api_cache (cache_key, response_data, created_at, expires_at, last_accessed, hit_count)
             VALUES (?1, ?2, ?3, ?4, ?3, 0)
             ON CONFLICT(cache_key) DO UPDATE SET
                response_data = excluded.response_data,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at,
                last_accessed = excluded.last_accessed,
                hit_count = 0",
            params![key, data, now, expires_at],
        )?;
        Ok(())
    }
}

/// Expiry stamp for a row written at `now`; a zero TTL never expires.
fn expires_at(now: i64, ttl_secs: u64) -> i64 {
    if ttl_secs == 0 {
        return i64::MAX;
    }
    now.saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX))
}

impl std::fmt::Debug for SqliteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCache")
            .field("default_ttl_secs", &self.default_ttl_secs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubelens_models::ManualClock;

    fn cache() -> (SqliteCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let cache = SqliteCache::in_memory()
            .unwrap()
            .with_clock(clock.clone())
            .with_default_ttl(100);
        (cache, clock)
    }

    #[test]
    fn test_hits_are_counted_but_do_not_change_reads() {
        let (cache, _clock) = cache();
        cache.set("k", &serde_json::json!({"v": 1})).unwrap();
        assert_eq!(cache.hit_count("k").unwrap(), Some(0));

        for _ in 0..3 {
            assert_eq!(cache.get("k", 0), Some(serde_json::json!({"v": 1})));
        }
        assert_eq!(cache.hit_count("k").unwrap(), Some(3));
    }

    #[test]
    fn test_overwrite_resets_hit_count() {
        let (cache, _clock) = cache();
        cache.set("k", &serde_json::json!(1)).unwrap();
        cache.get("k", 0);
        cache.set("k", &serde_json::json!(2)).unwrap();
        assert_eq!(cache.hit_count("k").unwrap(), Some(0));
        assert_eq!(cache.get("k", 0), Some(serde_json::json!(2)));
    }

    #[test]
    fn test_stale_read_does_not_count_as_hit() {
        let (cache, clock) = cache();
        cache.set("k", &serde_json::json!(1)).unwrap();
        clock.advance_secs(30);
        assert_eq!(cache.get("k", 10), None);
        assert_eq!(cache.hit_count("k").unwrap(), Some(0));
    }

    #[test]
    fn test_cleanup_expired_only_removes_past_rows() {
        let (cache, clock) = cache();
        cache.set("old", &serde_json::json!(1)).unwrap();
        clock.advance_secs(150);
        cache.set("new", &serde_json::json!(2)).unwrap();

        assert_eq!(cache.cleanup_expired().unwrap(), 1);
        assert_eq!(cache.get("old", 0), None);
        assert_eq!(cache.get("new", 0), Some(serde_json::json!(2)));
    }

    #[test]
    fn test_cleanup_follows_configured_ttl() {
        let (cache, clock) = cache();
        let cache = cache.with_default_ttl(86_400);
        cache.set("k", &serde_json::json!({"a": 1})).unwrap();
        clock.advance_secs(7 * 3600);

        assert_eq!(cache.cleanup_expired().unwrap(), 0);
        assert_eq!(cache.get("k", 86_400), Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn test_zero_or_huge_default_ttl_never_expires() {
        for ttl in [0, u64::MAX] {
            let (cache, clock) = cache();
            let cache = cache.with_default_ttl(ttl);
            cache.set("k", &serde_json::json!(1)).unwrap();
            clock.advance_secs(10 * 365 * 86_400);

            assert_eq!(cache.cleanup_expired().unwrap(), 0);
            assert_eq!(cache.stats().unwrap().expired_entries, 0);
        }
    }

    #[test]
    fn test_delete_and_clear() {
        let (cache, _clock) = cache();
        cache.set("a", &serde_json::json!(1)).unwrap();
        cache.set("b", &serde_json::json!(2)).unwrap();
        assert!(cache.delete("a").unwrap());
        assert!(!cache.delete("a").unwrap());
        assert_eq!(cache.clear_all().unwrap(), 1);
        assert_eq!(cache.get("b", 0), None);
    }

    #[test]
    fn test_stats() {
        let (cache, clock) = cache();
        cache.set("a", &serde_json::json!(1)).unwrap();
        cache.set("b", &serde_json::json!(2)).unwrap();
        cache.get("b", 0);
        cache.get("b", 0);
        cache.get("a", 0);
        clock.advance_secs(101);

        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.expired_entries, 2);
        assert_eq!(stats.total_hits, 3);
        assert_eq!(stats.top_hits[0], ("b".to_string(), 2));
    }
}
