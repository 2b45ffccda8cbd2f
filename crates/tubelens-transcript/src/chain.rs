//! Ordered fallback across transcript sources.

use std::sync::Arc;

use tracing::{debug, info, warn};

use tubelens_http::HttpTransport;
use tubelens_models::{Transcript, VideoId};

use crate::config::TranscriptConfig;
use crate::error::{TranscriptError, TranscriptResult};
use crate::sources::{default_sources, SourceOutcome, TranscriptSource};

/// Language used when the caller gives no usable preference.
pub const DEFAULT_LANG: &str = "en";

/// Tries each source in order and returns the first non-empty transcript.
pub struct TranscriptChain {
    sources: Vec<Box<dyn TranscriptSource>>,
}

impl TranscriptChain {
    /// Chain with the standard sources for `config`.
    pub fn new(transport: Arc<dyn HttpTransport>, config: &TranscriptConfig) -> Self {
        Self::with_sources(default_sources(transport, config))
    }

    pub fn with_sources(sources: Vec<Box<dyn TranscriptSource>>) -> Self {
        Self { sources }
    }

    /// Fetch a transcript, preferring languages in `preferred_langs` order.
    ///
    /// Returns [`TranscriptError::NotAvailable`] when sources answered but
    /// none had captions, and [`TranscriptError::Exhausted`] when every
    /// source failed without a usable answer.
    pub async fn get_transcript(
        &self,
        video: &VideoId,
        preferred_langs: &[String],
    ) -> TranscriptResult<Transcript> {
        let langs = candidate_langs(preferred_langs);
        let mut any_answered = false;
        let mut last_error = None;

        for source in &self.sources {
            let provider = source.provider();
            match source.fetch(video, &langs).await {
                SourceOutcome::Found(transcript) => {
                    info!(
                        video_id = %video,
                        provider = %provider,
                        lang = %transcript.lang,
                        segments = transcript.segments.len(),
                        "Transcript acquired"
                    );
                    metrics::counter!("tubelens_transcript_requests_total", "provider" => provider.as_str(), "outcome" => "found")
                        .increment(1);
                    return Ok(transcript);
                }
                SourceOutcome::Empty => {
                    debug!(video_id = %video, provider = %provider, "Source has no captions");
                    any_answered = true;
                }
                SourceOutcome::Failed(e) => {
                    warn!(video_id = %video, provider = %provider, error = %e, "Transcript source failed");
                    metrics::counter!("tubelens_transcript_requests_total", "provider" => provider.as_str(), "outcome" => "failed")
                        .increment(1);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_answered => Err(TranscriptError::exhausted(e)),
            _ => {
                info!(video_id = %video, "Transcript not available");
                Err(TranscriptError::NotAvailable)
            }
        }
    }
}

/// Trimmed non-empty languages, or the default when none remain.
pub fn candidate_langs(preferred: &[String]) -> Vec<String> {
    let langs: Vec<String> = preferred
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if langs.is_empty() {
        vec![DEFAULT_LANG.to_string()]
    } else {
        langs
    }
}
