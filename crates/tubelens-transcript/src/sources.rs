//! Transcript acquisition strategies.
//!
//! Each source makes its own sequence of requests and reports one
//! [`SourceOutcome`]. Request failures never escape a source; they are
//! folded into the outcome so the chain can simply move on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use tubelens_http::{HttpRequest, HttpResponse, HttpTransport};
use tubelens_models::{CaptionTrack, Transcript, TranscriptProvider, VideoId};

use crate::config::{ApiEndpoint, TranscriptConfig, FALLBACK_LANGS};
use crate::normalize::{normalize_body, SegmentSchema, PRIMARY_API_SCHEMA, TRANSCRIPT_API_SCHEMA};
use crate::timedtext::{is_caption_document, parse_caption_xml, parse_track_list};
use crate::track_selector;

/// Caption paths tried on the primary provider, in order.
pub const PRIMARY_API_PATHS: [&str; 3] = ["/transcript", "/captions", "/video/transcript"];

const TRANSCRIPT_API_PATH: &str = "/transcript-with-url";

/// What one source found.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Found(Transcript),
    /// At least one request was answered, but with no captions.
    Empty,
    /// No request got a usable answer; carries the last failure.
    Failed(String),
}

/// Tracks whether any request in a source was answered.
#[derive(Debug, Default)]
struct Attempts {
    answered: bool,
    last_error: Option<String>,
}

impl Attempts {
    fn answered(&mut self) {
        self.answered = true;
    }

    fn failed(&mut self, error: String) {
        self.last_error = Some(error);
    }

    fn finish(self) -> SourceOutcome {
        match self.last_error {
            Some(error) if !self.answered => SourceOutcome::Failed(error),
            _ => SourceOutcome::Empty,
        }
    }
}

/// One way of getting captions for a video.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    fn provider(&self) -> TranscriptProvider;

    /// Try to fetch captions. `langs` is never empty.
    async fn fetch(&self, video: &VideoId, langs: &[String]) -> SourceOutcome;
}

/// GET a keyed API and decode its JSON body.
///
/// A body carrying a non-empty `error` field counts as a failure.
async fn get_json(
    transport: &dyn HttpTransport,
    endpoint: &ApiEndpoint,
    path: &str,
    query: &[(&str, &str)],
    timeout: Duration,
) -> Result<Value, String> {
    let mut request = HttpRequest::get(endpoint.url(path))
        .header("X-RapidAPI-Key", endpoint.key.as_str())
        .header("X-RapidAPI-Host", endpoint.host.as_str())
        .timeout(timeout);
    for (name, value) in query {
        request = request.query(*name, *value);
    }

    let response = transport.send(request).await.map_err(|e| e.to_string())?;
    if response.status >= 400 {
        return Err(format!("HTTP {} from {}", response.status, endpoint.host));
    }

    let body: Value = response
        .json()
        .map_err(|_| "Invalid JSON response".to_string())?;
    match body.get("error") {
        Some(Value::String(e)) if !e.is_empty() => Err(e.clone()),
        Some(Value::Bool(true)) => Err(format!("Error flag set by {}", endpoint.host)),
        _ => Ok(body),
    }
}

fn build_transcript(
    body: &Value,
    schema: &SegmentSchema,
    lang: &str,
    provider: TranscriptProvider,
) -> Option<Transcript> {
    let segments = normalize_body(body, schema, lang);
    if segments.is_empty() {
        return None;
    }
    Some(Transcript::from_segments(lang, segments, provider))
}

/// Specialized transcript provider.
///
/// One request without a language hint, then one per preferred language.
pub struct TranscriptApiSource {
    transport: Arc<dyn HttpTransport>,
    endpoint: ApiEndpoint,
    timeout: Duration,
}

impl TranscriptApiSource {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoint: ApiEndpoint, timeout: Duration) -> Self {
        Self {
            transport,
            endpoint,
            timeout,
        }
    }
}

#[async_trait]
impl TranscriptSource for TranscriptApiSource {
    fn provider(&self) -> TranscriptProvider {
        TranscriptProvider::TranscriptApi
    }

    async fn fetch(&self, video: &VideoId, langs: &[String]) -> SourceOutcome {
        let watch_url = video.watch_url();
        let mut attempts = Attempts::default();

        let hints = std::iter::once(None).chain(langs.iter().map(|l| Some(l.as_str())));
        for hint in hints {
            let mut query = vec![("url", watch_url.as_str()), ("flat_text", "false")];
            if let Some(lang) = hint {
                query.push(("lang", lang));
            }

            let body = match get_json(
                self.transport.as_ref(),
                &self.endpoint,
                TRANSCRIPT_API_PATH,
                &query,
                self.timeout,
            )
            .await
            {
                Ok(body) => body,
                Err(e) => {
                    debug!(video_id = %video, lang = ?hint, error = %e, "Transcript API request failed");
                    attempts.failed(e);
                    continue;
                }
            };
            attempts.answered();

            let fallback = hint.or(langs.first().map(String::as_str)).unwrap_or("en");
            let segments = normalize_body(&body, &TRANSCRIPT_API_SCHEMA, fallback);
            if segments.is_empty() {
                continue;
            }
            // Unhinted requests report whatever language the provider detected
            let lang = match hint {
                Some(lang) => lang.to_string(),
                None => segments[0].lang.clone(),
            };
            return SourceOutcome::Found(Transcript::from_segments(lang, segments, self.provider()));
        }

        attempts.finish()
    }
}

/// Public caption tracks: list, select, fetch.
pub struct TimedTextSource {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    timeout: Duration,
}

impl TimedTextSource {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            timeout,
        }
    }

    async fn get(&self, query: &[(&str, &str)]) -> Result<HttpResponse, String> {
        let mut request = HttpRequest::get(&self.base_url).timeout(self.timeout);
        for (name, value) in query {
            request = request.query(*name, *value);
        }
        let response = self.transport.send(request).await.map_err(|e| e.to_string())?;
        if !response.is_success() {
            return Err(format!("HTTP {} from timed-text", response.status));
        }
        Ok(response)
    }

    async fn fetch_track(&self, video: &VideoId, track: &CaptionTrack) -> Result<Option<String>, String> {
        let mut query = vec![("v", video.as_str()), ("lang", track.lang_code.as_str())];
        if let Some(kind) = &track.kind_code {
            query.push(("kind", kind.as_str()));
        }
        if !track.name.is_empty() {
            query.push(("name", track.name.as_str()));
        }

        let response = self.get(&query).await?;
        Ok(is_caption_document(&response.body).then_some(response.body))
    }
}

#[async_trait]
impl TranscriptSource for TimedTextSource {
    fn provider(&self) -> TranscriptProvider {
        TranscriptProvider::TimedText
    }

    async fn fetch(&self, video: &VideoId, langs: &[String]) -> SourceOutcome {
        let list = match self.get(&[("v", video.as_str()), ("type", "list")]).await {
            Ok(response) => response,
            Err(e) => return SourceOutcome::Failed(e),
        };
        let tracks = parse_track_list(&list.body);
        if tracks.is_empty() {
            debug!(video_id = %video, "No caption tracks listed");
            return SourceOutcome::Empty;
        }

        let fallback: Vec<String> = FALLBACK_LANGS.iter().map(|l| l.to_string()).collect();
        let rounds: [&[String]; 3] = [langs, &fallback, &[]];
        let mut tried: Vec<&CaptionTrack> = Vec::new();

        for preferred in rounds {
            let Some(track) = track_selector::choose(&tracks, preferred) else {
                continue;
            };
            if tried.iter().any(|t| std::ptr::eq(*t, track)) {
                continue;
            }
            tried.push(track);

            match self.fetch_track(video, track).await {
                Ok(Some(xml)) => {
                    let segments = parse_caption_xml(&xml, &track.lang_code);
                    if !segments.is_empty() {
                        return SourceOutcome::Found(Transcript::from_segments(
                            track.lang_code.clone(),
                            segments,
                            self.provider(),
                        ));
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(video_id = %video, lang = %track.lang_code, error = %e, "Caption track fetch failed");
                }
            }
        }

        // The track list answered, so the video is simply without usable captions
        SourceOutcome::Empty
    }
}

/// Caption endpoints on the primary metadata provider.
pub struct PrimaryApiSource {
    transport: Arc<dyn HttpTransport>,
    endpoint: ApiEndpoint,
    timeout: Duration,
}

impl PrimaryApiSource {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoint: ApiEndpoint, timeout: Duration) -> Self {
        Self {
            transport,
            endpoint,
            timeout,
        }
    }
}

#[async_trait]
impl TranscriptSource for PrimaryApiSource {
    fn provider(&self) -> TranscriptProvider {
        TranscriptProvider::PrimaryApi
    }

    async fn fetch(&self, video: &VideoId, langs: &[String]) -> SourceOutcome {
        let mut attempts = Attempts::default();

        for lang in langs {
            for path in PRIMARY_API_PATHS {
                let query = [("id", video.as_str()), ("lang", lang.as_str())];
                match get_json(self.transport.as_ref(), &self.endpoint, path, &query, self.timeout).await {
                    Ok(body) => {
                        attempts.answered();
                        if let Some(transcript) =
                            build_transcript(&body, &PRIMARY_API_SCHEMA, lang, self.provider())
                        {
                            return SourceOutcome::Found(transcript);
                        }
                    }
                    Err(e) => {
                        debug!(video_id = %video, lang = %lang, path = path, error = %e, "Primary API caption request failed");
                        attempts.failed(e);
                    }
                }
            }
        }

        attempts.finish()
    }
}

/// Sources in their fixed order, skipping unconfigured ones.
pub fn default_sources(
    transport: Arc<dyn HttpTransport>,
    config: &TranscriptConfig,
) -> Vec<Box<dyn TranscriptSource>> {
    let mut sources: Vec<Box<dyn TranscriptSource>> = Vec::with_capacity(3);
    if let Some(endpoint) = &config.transcript_api {
        sources.push(Box::new(TranscriptApiSource::new(
            transport.clone(),
            endpoint.clone(),
            config.api_timeout,
        )));
    }
    sources.push(Box::new(TimedTextSource::new(
        transport.clone(),
        config.timedtext_url.clone(),
        config.timedtext_timeout,
    )));
    if let Some(endpoint) = &config.primary_api {
        sources.push(Box::new(PrimaryApiSource::new(
            transport,
            endpoint.clone(),
            config.api_timeout,
        )));
    }
    sources
}
