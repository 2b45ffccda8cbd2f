//! Completion provider descriptors.

use std::fmt;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn default_error_threshold() -> u32 {
    3
}

fn default_timeout_seconds() -> u64 {
    60
}

/// Immutable configuration of one completion backend.
///
/// Descriptors are loaded once at startup and never mutated; the mutable
/// failure bookkeeping lives in the breaker state, keyed by `name`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderDescriptor {
    /// Unique provider name
    pub name: String,
    /// Chat-completions endpoint URL
    pub endpoint: String,
    /// Bearer credential
    #[serde(alias = "key")]
    pub api_key: String,
    /// Model identifier sent in the payload
    pub model: String,
    /// Lower is tried first
    pub priority: i32,
    /// Consecutive failures before the provider is throttled
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,
    /// Per-request timeout
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl ProviderDescriptor {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        priority: i32,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            priority,
            error_threshold: default_error_threshold(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    pub fn with_error_threshold(mut self, threshold: u32) -> Self {
        self.error_threshold = threshold;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = timeout.as_secs();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

// Keep credentials out of logs.
impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("priority", &self.priority)
            .field("error_threshold", &self.error_threshold)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_defaults_and_alias() {
        let json = r#"{
            "name": "primary",
            "endpoint": "https://api.example.com/v1/chat/completions",
            "key": "secret",
            "model": "gpt-5-chat",
            "priority": 1
        }"#;
        let provider: ProviderDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(provider.api_key, "secret");
        assert_eq!(provider.error_threshold, 3);
        assert_eq!(provider.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_debug_redacts_key() {
        let provider = ProviderDescriptor::new("p", "http://x", "secret", "m", 1);
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("***"));
    }
}
