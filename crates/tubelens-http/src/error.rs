//! Transport error types.

use thiserror::Error;

pub type HttpResult<T> = Result<T, HttpError>;

/// Failures where no response reached the caller.
///
/// A response with an error status is not an `HttpError`; it is returned
/// as an [`HttpResponse`](crate::HttpResponse) and classified by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl HttpError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Timeout(_))
    }
}
