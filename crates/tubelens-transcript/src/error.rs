//! Transcript acquisition errors.

use thiserror::Error;

pub type TranscriptResult<T> = Result<T, TranscriptError>;

/// Why no transcript was returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptError {
    /// Sources answered but none had captions. Expected for many videos.
    #[error("Transcript not available")]
    NotAvailable,

    /// No source produced a usable answer at all.
    #[error("All transcript sources failed: {last_error}")]
    Exhausted { last_error: String },

    /// Offline mode is on and nothing is cached.
    #[error("Offline mode: no cached transcript for this video")]
    Offline,
}

impl TranscriptError {
    pub fn exhausted(last_error: impl Into<String>) -> Self {
        Self::Exhausted {
            last_error: last_error.into(),
        }
    }

    /// The video has no captions; not a fault.
    pub fn is_not_available(&self) -> bool {
        matches!(self, TranscriptError::NotAvailable)
    }

    /// Whether trying again later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TranscriptError::Exhausted { .. })
    }
}
