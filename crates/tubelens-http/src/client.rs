//! reqwest-backed transport.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method};
use tracing::debug;

use crate::error::{HttpError, HttpResult};
use crate::types::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};

/// Configuration for the shared HTTP client.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// User-Agent sent with every request
    pub user_agent: String,
    /// TCP connect timeout
    pub connect_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; tubelens/0.1)".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl HttpClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            user_agent: std::env::var("HTTP_USER_AGENT").unwrap_or(defaults.user_agent),
            connect_timeout: Duration::from_secs(
                std::env::var("HTTP_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}

/// Production transport. Redirects are followed; each request carries
/// its own timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new(config: HttpClientConfig) -> HttpResult<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| HttpError::invalid_request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http })
    }

    /// Create from environment variables.
    pub fn from_env() -> HttpResult<Self> {
        Self::new(HttpClientConfig::from_env())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> HttpResult<HttpResponse> {
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        };
        let timeout = request.timeout;

        let mut builder = self.http.request(method, &request.url).timeout(timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let started = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        debug!(
            url = %request.url,
            status = status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "HTTP request completed"
        );

        Ok(HttpResponse { status, body })
    }
}

fn map_reqwest_error(error: reqwest::Error, timeout: Duration) -> HttpError {
    if error.is_timeout() {
        HttpError::Timeout(timeout.as_millis() as u64)
    } else if error.is_builder() {
        HttpError::invalid_request(error.to_string())
    } else {
        HttpError::network(error.to_string())
    }
}
