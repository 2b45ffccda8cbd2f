//! Caption tracks and normalized transcript models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Whether a caption track was written by a person or generated by ASR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    #[default]
    Human,
    Auto,
}

/// One available caption stream for a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionTrack {
    pub lang_code: String,
    pub translated_name: String,
    pub kind: TrackKind,
    /// `kind` attribute exactly as listed, echoed back when fetching
    #[serde(default)]
    pub kind_code: Option<String>,
    /// Track variant label, may be empty
    pub name: String,
}

impl CaptionTrack {
    pub fn new(lang_code: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            lang_code: lang_code.into(),
            translated_name: String::new(),
            kind,
            kind_code: (kind == TrackKind::Auto).then(|| "asr".to_string()),
            name: String::new(),
        }
    }

    pub fn is_auto(&self) -> bool {
        self.kind == TrackKind::Auto
    }
}

/// One timed caption unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    /// Start offset in seconds
    pub start: f64,
    /// Length in seconds; `None` means unknown, which is not the same as zero
    pub duration: Option<f64>,
    pub text: String,
    pub lang: String,
}

/// Which acquisition strategy produced a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TranscriptProvider {
    /// Specialized third-party transcript API
    TranscriptApi,
    /// Public timed-text caption tracks
    TimedText,
    /// Fallback endpoints on the primary metadata provider
    PrimaryApi,
}

impl TranscriptProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptProvider::TranscriptApi => "transcript-api",
            TranscriptProvider::TimedText => "timed-text",
            TranscriptProvider::PrimaryApi => "primary-api",
        }
    }
}

impl std::fmt::Display for TranscriptProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete, non-empty transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transcript {
    pub lang: String,
    pub segments: Vec<TranscriptSegment>,
    /// Segment texts joined in order
    pub text: String,
    pub provider: TranscriptProvider,
}

impl Transcript {
    /// Build a transcript, deriving the plain text from the segments.
    pub fn from_segments(
        lang: impl Into<String>,
        segments: Vec<TranscriptSegment>,
        provider: TranscriptProvider,
    ) -> Self {
        let text = join_segment_text(&segments);
        Self {
            lang: lang.into(),
            segments,
            text,
            provider,
        }
    }
}

/// Join trimmed segment texts with single spaces.
pub fn join_segment_text(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
