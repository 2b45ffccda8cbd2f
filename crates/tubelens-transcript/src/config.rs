//! Transcript source configuration.

use std::time::Duration;

use tracing::info;

/// Public caption endpoint.
pub const DEFAULT_TIMEDTEXT_URL: &str = "https://www.youtube.com/api/timedtext";

/// Languages tried by the caption-track strategy after the caller's own.
pub const FALLBACK_LANGS: [&str; 2] = ["en", "tr"];

/// A keyed third-party API reached through a gateway host.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiEndpoint {
    /// Scheme and authority requests are sent to
    pub base_url: String,
    /// Value of the `X-RapidAPI-Host` header
    pub host: String,
    pub key: String,
}

impl ApiEndpoint {
    /// Endpoint served at `https://{host}`.
    pub fn rapidapi(host: impl Into<String>, key: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            base_url: format!("https://{}", host),
            host,
            key: key.into(),
        }
    }

    /// Endpoint served at an explicit base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl std::fmt::Debug for ApiEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiEndpoint")
            .field("base_url", &self.base_url)
            .field("host", &self.host)
            .field("key", &"***")
            .finish()
    }
}

/// Transcript acquisition configuration.
#[derive(Debug, Clone)]
pub struct TranscriptConfig {
    /// Specialized transcript provider; skipped when unset
    pub transcript_api: Option<ApiEndpoint>,
    /// Primary metadata provider used for the fallback endpoints
    pub primary_api: Option<ApiEndpoint>,
    pub timedtext_url: String,
    /// Bound on each caption-track request
    pub timedtext_timeout: Duration,
    /// Bound on each keyed API request
    pub api_timeout: Duration,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            transcript_api: None,
            primary_api: None,
            timedtext_url: DEFAULT_TIMEDTEXT_URL.to_string(),
            timedtext_timeout: Duration::from_secs(15),
            api_timeout: Duration::from_secs(20),
        }
    }
}

impl TranscriptConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let endpoint = |host_var: &str, key_var: &str| match (var(host_var), var(key_var)) {
            (Some(host), Some(key)) if !host.is_empty() && !key.is_empty() => {
                Some(ApiEndpoint::rapidapi(host, key))
            }
            _ => None,
        };

        let config = Self {
            transcript_api: endpoint("TRANSCRIPT_API_HOST", "TRANSCRIPT_API_KEY"),
            primary_api: endpoint("PRIMARY_API_HOST", "PRIMARY_API_KEY"),
            timedtext_url: var("TIMEDTEXT_BASE_URL")
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.timedtext_url),
            timedtext_timeout: var("TRANSCRIPT_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timedtext_timeout),
            api_timeout: defaults.api_timeout,
        };

        info!(
            transcript_api = config.transcript_api.is_some(),
            primary_api = config.primary_api.is_some(),
            "Loaded transcript configuration"
        );
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars() {
        let config = TranscriptConfig::from_vars(|key| match key {
            "PRIMARY_API_HOST" => Some("yt-api.p.rapidapi.com".to_string()),
            "PRIMARY_API_KEY" => Some("secret".to_string()),
            "TRANSCRIPT_API_HOST" => Some("transcripts.example".to_string()),
            "TRANSCRIPT_TIMEOUT_SECS" => Some("5".to_string()),
            _ => None,
        });

        let primary = config.primary_api.unwrap();
        assert_eq!(primary.base_url, "https://yt-api.p.rapidapi.com");
        assert_eq!(primary.url("/captions"), "https://yt-api.p.rapidapi.com/captions");
        // Host without key is not configured
        assert!(config.transcript_api.is_none());
        assert_eq!(config.timedtext_timeout, Duration::from_secs(5));
        assert_eq!(config.timedtext_url, DEFAULT_TIMEDTEXT_URL);
    }

    #[test]
    fn test_debug_hides_key() {
        let endpoint = ApiEndpoint::rapidapi("h", "secret").with_base_url("http://127.0.0.1:9/");
        assert_eq!(endpoint.base_url, "http://127.0.0.1:9");
        assert!(!format!("{:?}", endpoint).contains("secret"));
    }
}
