//! Process configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use tubelens_ai::{AiConfig, BreakerState};
use tubelens_http::HttpClientConfig;
use tubelens_storage::sqlite_cache::DEFAULT_TTL_SECS;
use tubelens_storage::{FileCache, OfflineMode, SqliteCache, TtlCache};
use tubelens_transcript::TranscriptConfig;

const BREAKER_STATE_FILE: &str = "breaker_state.json";

/// Cache and local storage settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory of the file-per-key cache
    pub dir: PathBuf,
    /// SQLite database; when set it replaces the file cache
    pub db_path: Option<PathBuf>,
    /// TTL applied to cache reads
    pub ttl_secs: u64,
    /// Holds the offline flag and breaker state
    pub storage_dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("cache"),
            db_path: None,
            ttl_secs: DEFAULT_TTL_SECS,
            storage_dir: PathBuf::from("storage"),
        }
    }
}

impl CacheConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            dir: var("CACHE_DIR").map(PathBuf::from).unwrap_or(defaults.dir),
            db_path: var("CACHE_DB_PATH")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            ttl_secs: var("CACHE_TTL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.ttl_secs),
            storage_dir: var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
        }
    }
}

/// Everything the binary needs.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http: HttpClientConfig,
    pub ai: AiConfig,
    pub transcript: TranscriptConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            http: HttpClientConfig::from_env(),
            ai: AiConfig::from_env().context("Failed to load AI provider configuration")?,
            transcript: TranscriptConfig::from_env(),
            cache: CacheConfig::from_env(),
        })
    }

    pub fn offline_mode(&self) -> OfflineMode {
        OfflineMode::new(self.cache.storage_dir.clone())
    }

    /// SQLite cache if configured.
    pub fn sqlite_cache(&self) -> Result<Option<SqliteCache>> {
        let Some(path) = &self.cache.db_path else {
            return Ok(None);
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let cache = SqliteCache::open(path)
            .with_context(|| format!("Failed to open cache database {}", path.display()))?
            .with_default_ttl(self.cache.ttl_secs);
        Ok(Some(cache))
    }

    /// The configured cache backend.
    pub fn cache(&self) -> Result<Arc<dyn TtlCache>> {
        if let Some(sqlite) = self.sqlite_cache()? {
            info!(path = ?self.cache.db_path, "Using SQLite cache");
            return Ok(Arc::new(sqlite));
        }
        let cache = FileCache::new(self.cache.dir.clone()).context("Failed to open file cache")?;
        info!(dir = ?cache.dir(), "Using file cache");
        Ok(Arc::new(cache))
    }
}

/// Breaker state persisted between invocations, standing in for a
/// caller session.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(storage_dir: &std::path::Path) -> Self {
        Self {
            path: storage_dir.join(BREAKER_STATE_FILE),
        }
    }

    /// Saved state, or a fresh one when missing or unreadable.
    pub fn load(&self) -> BreakerState {
        let Ok(raw) = std::fs::read_to_string(&self.path) else {
            return BreakerState::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = ?self.path, error = %e, "Discarding unreadable breaker state");
            BreakerState::default()
        })
    }

    pub fn save(&self, state: &BreakerState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}
