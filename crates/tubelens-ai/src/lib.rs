//! Completion provider failover.
//!
//! This crate provides:
//! - A priority-ordered provider registry with a per-provider circuit breaker
//! - The completion orchestrator that fails over between providers
//! - A read-through completion cache with offline support
//! - Provider configuration loading

pub mod cached;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod registry;

pub use cached::CachedCompletions;
pub use config::{parse_providers, AiConfig};
pub use error::{AiError, AiResult, AttemptError, CompletionError};
pub use orchestrator::{Completion, CompletionOrchestrator, ProbeReport};
pub use registry::{
    BreakerState, ProviderErrorState, ProviderRegistry, ProviderReport, ProviderStatus,
    DEFAULT_RESET_WINDOW,
};
