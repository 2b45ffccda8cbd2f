//! Cache contract shared by every backend.
//!
//! A read passes its own TTL: an entry is visible while
//! `now - stored_at <= ttl_secs`, and `ttl_secs == 0` means the entry never
//! expires for that read. Writes overwrite the whole entry. Concurrent
//! writers to one key are last-write-wins; entries are recomputations of
//! the same external fact, so no lock is taken.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::StorageResult;

pub(crate) fn is_fresh(stored_at: DateTime<Utc>, now: DateTime<Utc>, ttl_secs: u64) -> bool {
    if ttl_secs == 0 {
        return true;
    }
    let age = (now - stored_at).num_seconds();
    age <= i64::try_from(ttl_secs).unwrap_or(i64::MAX)
}

/// Key/value store with per-read expiry.
pub trait TtlCache: Send + Sync {
    /// Stored value, or `None` when absent, unreadable or older than `ttl_secs`.
    fn get(&self, key: &str, ttl_secs: u64) -> Option<Value>;

    /// Store `value` under `key`, replacing any previous entry.
    fn set(&self, key: &str, value: &Value) -> StorageResult<()>;
}

/// Typed helpers over [`TtlCache`].
pub trait TtlCacheExt: TtlCache {
    /// Read and decode; a payload that does not decode is a miss.
    fn get_as<T: DeserializeOwned>(&self, key: &str, ttl_secs: u64) -> Option<T> {
        let value = self.get(key, ttl_secs)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                debug!(key = %key, error = %e, "Cache payload did not decode, treating as miss");
                None
            }
        }
    }

    fn set_as<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let value = serde_json::to_value(value)?;
        self.set(key, &value)
    }
}

impl<C: TtlCache + ?Sized> TtlCacheExt for C {}
