//! TTL caches and offline-mode state.
//!
//! This crate provides:
//! - The [`TtlCache`] contract shared by every cache backend
//! - A file-per-key JSON cache ([`FileCache`])
//! - A row-per-key SQLite cache with hit bookkeeping ([`SqliteCache`])
//! - Deterministic cache key derivation
//! - The persisted offline-mode flag ([`OfflineMode`])

pub mod cache;
pub mod error;
pub mod file_cache;
pub mod keys;
pub mod offline;
pub mod sqlite_cache;

pub use cache::{TtlCache, TtlCacheExt};
pub use error::{StorageError, StorageResult};
pub use file_cache::FileCache;
pub use keys::{cache_key, sanitize_key};
pub use offline::OfflineMode;
pub use sqlite_cache::{CacheStats, SqliteCache};
