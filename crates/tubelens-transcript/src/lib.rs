//! Caption acquisition for videos.
//!
//! This crate provides:
//! - Three acquisition strategies behind the [`TranscriptSource`] trait
//! - Per-source normalization of provider JSON into segments
//! - Timed-text track list and caption XML parsing
//! - The caption track selector
//! - The ordered [`TranscriptChain`] and the cached [`TranscriptService`]

pub mod chain;
pub mod config;
pub mod error;
pub mod normalize;
pub mod service;
pub mod sources;
pub mod timedtext;
pub mod track_selector;

pub use chain::{candidate_langs, TranscriptChain, DEFAULT_LANG};
pub use config::{ApiEndpoint, TranscriptConfig, DEFAULT_TIMEDTEXT_URL, FALLBACK_LANGS};
pub use error::{TranscriptError, TranscriptResult};
pub use service::TranscriptService;
pub use sources::{
    default_sources, PrimaryApiSource, SourceOutcome, TimedTextSource, TranscriptApiSource,
    TranscriptSource, PRIMARY_API_PATHS,
};
