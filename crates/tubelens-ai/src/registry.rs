//! Provider registry and per-provider circuit breaker.
//!
//! The registry owns the static provider list and the mutable
//! [`BreakerState`]. The host keeps one registry (or its serialized
//! state) per caller session and hands it to the orchestrator by `&mut`;
//! nothing here touches ambient global state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tubelens_models::{Clock, ProviderDescriptor, SystemClock};

/// Default cooldown before a failed provider is forgiven.
pub const DEFAULT_RESET_WINDOW: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    #[default]
    Active,
    Throttled,
}

/// Failure bookkeeping for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderErrorState {
    pub failure_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub status: ProviderStatus,
}

impl ProviderErrorState {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Error state of every provider touched in one session, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BreakerState(pub HashMap<String, ProviderErrorState>);

impl BreakerState {
    pub fn get(&self, name: &str) -> Option<&ProviderErrorState> {
        self.0.get(name)
    }
}

/// One row of [`ProviderRegistry::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderReport {
    pub name: String,
    pub priority: i32,
    pub failure_count: u32,
    pub status: ProviderStatus,
    pub error_threshold: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
}

/// Priority-ordered providers plus their breaker state.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    /// Sorted ascending by priority; ties keep configuration order
    providers: Vec<ProviderDescriptor>,
    reset_window: Duration,
    state: BreakerState,
    clock: Arc<dyn Clock>,
}

impl ProviderRegistry {
    pub fn new(mut providers: Vec<ProviderDescriptor>, reset_window: Duration) -> Self {
        providers.sort_by_key(|p| p.priority);
        Self {
            providers,
            reset_window,
            state: BreakerState::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Restore state saved from an earlier call in the same session.
    pub fn with_state(mut self, state: BreakerState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &BreakerState {
        &self.state
    }

    /// Hand the state back to the host for persisting.
    pub fn into_state(self) -> BreakerState {
        self.state
    }

    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn reset_window(&self) -> Duration {
        self.reset_window
    }

    /// Best currently usable provider.
    ///
    /// Returns the first provider in priority order that is active and
    /// under its threshold. If every provider is throttled the
    /// highest-priority one is returned anyway. `None` only when no
    /// provider is configured.
    pub fn select_provider(&mut self) -> Option<ProviderDescriptor> {
        self.select_excluding(&[])
    }

    /// Like [`select_provider`](Self::select_provider), ignoring providers
    /// named in `exclude`.
    pub(crate) fn select_excluding(&mut self, exclude: &[String]) -> Option<ProviderDescriptor> {
        let now = self.clock.now();
        let mut first_candidate = None;

        for provider in &self.providers {
            if exclude.iter().any(|name| name == &provider.name) {
                continue;
            }
            first_candidate.get_or_insert(provider);

            let entry = self.state.0.entry(provider.name.clone()).or_default();
            if cooldown_elapsed(entry, now, self.reset_window) {
                debug!(provider = %provider.name, "Reset window elapsed, reactivating provider");
                entry.reset();
            }

            if entry.status == ProviderStatus::Active
                && entry.failure_count < provider.error_threshold
            {
                return Some(provider.clone());
            }
        }

        if let Some(provider) = first_candidate {
            warn!(
                provider = %provider.name,
                "All providers throttled, falling back to highest priority"
            );
        }
        first_candidate.cloned()
    }

    pub fn record_success(&mut self, name: &str) {
        self.state.0.entry(name.to_string()).or_default().reset();
    }

    pub fn record_failure(&mut self, name: &str) {
        let threshold = self
            .providers
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.error_threshold);
        let now = self.clock.now();

        let entry = self.state.0.entry(name.to_string()).or_default();
        entry.failure_count = entry.failure_count.saturating_add(1);
        entry.last_failure_time = Some(now);

        if let Some(threshold) = threshold {
            if entry.failure_count >= threshold && entry.status != ProviderStatus::Throttled {
                entry.status = ProviderStatus::Throttled;
                info!(
                    provider = %name,
                    failures = entry.failure_count,
                    "Provider throttled"
                );
            }
        }
    }

    /// Per-provider diagnostics in priority order.
    pub fn status(&self) -> Vec<ProviderReport> {
        self.providers
            .iter()
            .map(|p| {
                let state = self.state.get(&p.name).cloned().unwrap_or_default();
                ProviderReport {
                    name: p.name.clone(),
                    priority: p.priority,
                    failure_count: state.failure_count,
                    status: state.status,
                    error_threshold: p.error_threshold,
                    last_failure_time: state.last_failure_time,
                }
            })
            .collect()
    }
}

fn cooldown_elapsed(state: &ProviderErrorState, now: DateTime<Utc>, window: Duration) -> bool {
    let Some(last) = state.last_failure_time else {
        return false;
    };
    let elapsed = now.signed_duration_since(last);
    elapsed.num_milliseconds() > i64::try_from(window.as_millis()).unwrap_or(i64::MAX)
}
