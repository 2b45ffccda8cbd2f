//! Content identifier parsing.
//!
//! Accepts either a bare 11-character YouTube id or any of the common
//! URL shapes that embed one:
//! - https://youtube.com/watch?v=VIDEO_ID (with `v` anywhere in the query)
//! - https://youtu.be/VIDEO_ID
//! - https://youtube.com/embed/VIDEO_ID
//! - https://youtube.com/shorts/VIDEO_ID
//! - https://youtube.com/v/VIDEO_ID

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Length of every YouTube video id.
const VIDEO_ID_LEN: usize = 11;

/// Errors that can occur while parsing a content identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VideoIdError {
    #[error("input is empty")]
    Empty,

    #[error("no video id found in input: {0}")]
    NotFound(String),
}

/// YouTube video id (always 11 characters of `[A-Za-z0-9_-]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Parse a bare id or a URL containing one.
    pub fn parse(input: &str) -> Result<Self, VideoIdError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(VideoIdError::Empty);
        }

        if is_valid_id(input) {
            return Ok(Self(input.to_string()));
        }

        for marker in ["?v=", "&v=", "youtu.be/", "embed/", "shorts/", "v/"] {
            if let Some(id) = id_after(input, marker) {
                return Ok(Self(id));
            }
        }

        // Last resort: a well-formed URL whose query carries `v`
        if let Ok(url) = Url::parse(input) {
            if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
                if is_valid_id(&v) {
                    return Ok(Self(v.into_owned()));
                }
            }
        }

        Err(VideoIdError::NotFound(input.to_string()))
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL for this id.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for VideoId {
    type Err = VideoIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Take the 11 characters following `marker`, if they form a valid id.
fn id_after(input: &str, marker: &str) -> Option<String> {
    let start = input.find(marker)? + marker.len();
    let candidate = input.get(start..start + VIDEO_ID_LEN)?;
    is_valid_id(candidate).then(|| candidate.to_string())
}

fn is_valid_id(s: &str) -> bool {
    s.len() == VIDEO_ID_LEN
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_id() {
        assert_eq!(VideoId::parse("dQw4w9WgXcQ").unwrap().as_str(), "dQw4w9WgXcQ");
        assert_eq!(VideoId::parse("  a-b_c123456 ").unwrap().as_str(), "a-b_c123456");
    }

    #[test]
    fn test_parse_url_shapes() {
        let cases = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?t=42",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://youtube.com/shorts/dQw4w9WgXcQ",
            "https://youtube.com/v/dQw4w9WgXcQ",
        ];
        for case in cases {
            assert_eq!(VideoId::parse(case).unwrap().as_str(), "dQw4w9WgXcQ", "{}", case);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(VideoId::parse("   "), Err(VideoIdError::Empty));
        assert!(matches!(VideoId::parse("too-short"), Err(VideoIdError::NotFound(_))));
        assert!(VideoId::parse("https://example.com/watch?v=short").is_err());
        assert!(VideoId::parse("dQw4w9WgXc!").is_err());
    }

    #[test]
    fn test_watch_url() {
        let id = VideoId::parse("dQw4w9WgXcQ").unwrap();
        assert_eq!(id.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(id.to_string(), "dQw4w9WgXcQ");
    }
}
