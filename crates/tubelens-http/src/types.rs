//! Transport request/response types.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{HttpError, HttpResult};

/// Default bound on a single request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Performs one network call.
///
/// Implementations return `Err` only for transport failures (no response).
/// Every received response, whatever its status, is returned as `Ok`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> HttpResult<HttpResponse>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            query: Vec::new(),
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            body: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// POST with a JSON body.
    pub fn post_json<T: Serialize>(url: impl Into<String>, body: &T) -> HttpResult<Self> {
        let body = serde_json::to_string(body)
            .map_err(|e| HttpError::invalid_request(format!("Failed to encode body: {}", e)))?;

        Ok(Self {
            method: HttpMethod::Post,
            url: url.into(),
            query: Vec::new(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ],
            body: Some(body),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Value of a query parameter, if present.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A response that reached the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }

    /// First `max_chars` characters of the body, for error messages.
    pub fn body_excerpt(&self, max_chars: usize) -> String {
        self.body.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_json_sets_body_and_headers() {
        let request = HttpRequest::post_json("http://x/y", &serde_json::json!({"a": 1}))
            .unwrap()
            .header("Authorization", "Bearer k")
            .timeout(Duration::from_secs(5));

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body.as_deref(), Some(r#"{"a":1}"#));
        assert!(request
            .headers
            .iter()
            .any(|(k, v)| k == "Authorization" && v == "Bearer k"));
        assert_eq!(request.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_query_value() {
        let request = HttpRequest::get("http://x").query("lang", "tr");
        assert_eq!(request.query_value("lang"), Some("tr"));
        assert_eq!(request.query_value("v"), None);
    }

    #[test]
    fn test_response_helpers() {
        let response = HttpResponse::new(404, "not here at all");
        assert!(!response.is_success());
        assert_eq!(response.body_excerpt(8), "not here");
        assert!(HttpResponse::new(204, "").is_success());
    }
}
