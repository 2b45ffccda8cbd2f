//! AI provider configuration.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use tubelens_models::ProviderDescriptor;

use crate::error::{AiError, AiResult};
use crate::registry::{ProviderRegistry, DEFAULT_RESET_WINDOW};

/// Provider list plus the breaker reset window.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub providers: Vec<ProviderDescriptor>,
    /// How long after its last failure a provider is forgiven
    pub error_reset_window: Duration,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            error_reset_window: DEFAULT_RESET_WINDOW,
        }
    }
}

impl AiConfig {
    /// Create config from environment variables.
    ///
    /// Providers come from, in order: the JSON file at `AI_PROVIDERS_FILE`,
    /// inline JSON in `AI_PROVIDERS`, or a single provider built from
    /// `AI_ENDPOINT`/`AI_API_KEY`/`AI_MODEL`.
    pub fn from_env() -> AiResult<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> AiResult<Self> {
        let error_reset_window = var("AI_ERROR_RESET_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RESET_WINDOW);

        let providers = if let Some(path) = var("AI_PROVIDERS_FILE").filter(|s| !s.is_empty()) {
            load_providers_file(Path::new(&path))?
        } else if let Some(json) = var("AI_PROVIDERS").filter(|s| !s.trim().is_empty()) {
            parse_providers(&json)?
        } else if let (Some(endpoint), Some(api_key)) = (var("AI_ENDPOINT"), var("AI_API_KEY")) {
            let model = var("AI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
            vec![ProviderDescriptor::new("default", endpoint, api_key, model, 1)]
        } else {
            warn!("No AI providers configured");
            Vec::new()
        };

        info!(
            providers = providers.len(),
            reset_secs = error_reset_window.as_secs(),
            "Loaded AI configuration"
        );

        Ok(Self {
            providers,
            error_reset_window,
        })
    }

    /// Fresh registry for a new caller session.
    pub fn registry(&self) -> ProviderRegistry {
        ProviderRegistry::new(self.providers.clone(), self.error_reset_window)
    }
}

fn load_providers_file(path: &Path) -> AiResult<Vec<ProviderDescriptor>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AiError::config_error(format!(
            "Failed to read providers file {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_providers(&raw)
}

/// Parse a JSON array of provider descriptors.
///
/// Names must be unique and endpoints non-empty.
pub fn parse_providers(json: &str) -> AiResult<Vec<ProviderDescriptor>> {
    let providers: Vec<ProviderDescriptor> = serde_json::from_str(json)?;

    let mut seen = HashSet::new();
    for provider in &providers {
        if provider.endpoint.trim().is_empty() {
            return Err(AiError::config_error(format!(
                "Provider '{}' has no endpoint",
                provider.name
            )));
        }
        if !seen.insert(provider.name.as_str()) {
            return Err(AiError::config_error(format!(
                "Duplicate provider name '{}'",
                provider.name
            )));
        }
    }

    Ok(providers)
}
