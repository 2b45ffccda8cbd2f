//! AI layer error types.

use thiserror::Error;
use tubelens_http::HttpError;

pub type AiResult<T> = Result<T, AiError>;

/// Configuration and setup failures.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AiError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

/// Why one attempt against one provider failed.
///
/// Every variant is recorded against the provider and absorbed into a
/// "try the next provider" decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// No response reached us.
    #[error("Transport error: {0}")]
    Transport(#[from] HttpError),

    /// Response with an error status.
    #[error("HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Body is not JSON.
    #[error("Invalid JSON response")]
    Malformed,

    /// JSON without a non-empty answer.
    #[error("No content in response")]
    Empty,
}

impl AttemptError {
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            body: body.into(),
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptError::Transport(_) => "transport",
            AttemptError::Rejected { .. } => "rejected",
            AttemptError::Malformed => "malformed",
            AttemptError::Empty => "empty",
        }
    }
}

/// Outcome of a completion request that produced no answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("No available AI providers")]
    NoProviders,

    #[error("{}", exhausted_message(.last_error))]
    Exhausted {
        attempts: usize,
        last_error: Option<AttemptError>,
    },

    #[error("Offline mode: no cached completion for this conversation")]
    Offline,
}

fn exhausted_message(last_error: &Option<AttemptError>) -> String {
    match last_error {
        Some(e) => e.to_string(),
        None => "All AI providers failed".to_string(),
    }
}

impl CompletionError {
    /// Whether trying again later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CompletionError::Exhausted { .. })
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, CompletionError::Offline)
    }
}
