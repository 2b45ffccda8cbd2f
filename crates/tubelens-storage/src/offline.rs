//! Offline-mode flag.
//!
//! Offline mode is a `.offline` marker file in the storage directory, so
//! it survives restarts and is shared by every process using that
//! directory. While it is set, read-through services answer from the cache
//! only.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::StorageResult;

const FLAG_FILE: &str = ".offline";
const FALLBACK_DIR: &str = "tubelens-output";

#[derive(Debug, Clone)]
pub struct OfflineMode {
    storage_dir: PathBuf,
}

impl OfflineMode {
    /// Use `storage_dir`, falling back to a temp directory when it cannot
    /// be created or written.
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: resolve_storage_dir(storage_dir.into()),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn flag_path(&self) -> PathBuf {
        self.storage_dir.join(FLAG_FILE)
    }

    pub fn is_offline(&self) -> bool {
        self.flag_path().is_file()
    }

    pub fn set_offline(&self, on: bool) -> StorageResult<()> {
        let path = self.flag_path();
        if on {
            fs::write(&path, chrono::Utc::now().timestamp().to_string())?;
        } else if path.is_file() {
            fs::remove_file(&path)?;
        }
        info!(offline = on, "Offline mode updated");
        Ok(())
    }
}

fn resolve_storage_dir(preferred: PathBuf) -> PathBuf {
    if is_writable_dir(&preferred) {
        return preferred;
    }

    let fallback = std::env::temp_dir().join(FALLBACK_DIR);
    warn!(
        preferred = ?preferred,
        fallback = ?fallback,
        "Storage directory not writable, using temp directory"
    );
    if let Err(e) = fs::create_dir_all(&fallback) {
        warn!(error = %e, "Failed to create fallback storage directory");
    }
    fallback
}

fn is_writable_dir(dir: &Path) -> bool {
    if fs::create_dir_all(dir).is_err() {
        return false;
    }
    fs::metadata(dir)
        .map(|meta| meta.is_dir() && !meta.permissions().readonly())
        .unwrap_or(false)
}
