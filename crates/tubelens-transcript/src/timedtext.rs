//! Public timed-text caption format.
//!
//! Two documents are involved: the track list (`<track .../>` elements)
//! and the caption body (`<text start dur>` in seconds, or `<p t d>` in
//! milliseconds).

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use tubelens_models::{CaptionTrack, TrackKind, TranscriptSegment};

static TRACK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<track\s+([^>]*?)/?>").expect("valid track regex"));

static ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([A-Za-z_][\w-]*)\s*=\s*"([^"]*)""#).expect("valid attr regex"));

static CUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(text|p)\b([^>]*)>(.*?)</(?:text|p)>").expect("valid cue regex")
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid space regex"));

/// `kind` attribute value marking ASR tracks.
pub const ASR_KIND: &str = "asr";

/// Whether a caption body looks like a timed-text document.
pub fn is_caption_document(body: &str) -> bool {
    body.contains("<transcript") || body.contains("<timedtext")
}

/// Parse the track list document.
pub fn parse_track_list(xml: &str) -> Vec<CaptionTrack> {
    TRACK_RE
        .captures_iter(xml)
        .filter_map(|caps| {
            let attrs = attributes(caps.get(1)?.as_str());
            let lang_code = attrs.get("lang_code").cloned().unwrap_or_default();
            if lang_code.is_empty() {
                return None;
            }
            let kind_code = attrs.get("kind").filter(|k| !k.is_empty()).cloned();
            let kind = match kind_code.as_deref() {
                Some(ASR_KIND) => TrackKind::Auto,
                _ => TrackKind::Human,
            };
            Some(CaptionTrack {
                lang_code,
                translated_name: attrs.get("lang_translated").cloned().unwrap_or_default(),
                kind,
                kind_code,
                name: attrs.get("name").cloned().unwrap_or_default(),
            })
        })
        .collect()
}

/// Parse a caption body into segments tagged with `lang`.
pub fn parse_caption_xml(xml: &str, lang: &str) -> Vec<TranscriptSegment> {
    CUE_RE
        .captures_iter(xml)
        .filter_map(|caps| {
            let attrs = attributes(caps.get(2)?.as_str());
            let (start, duration) = cue_timing(&attrs)?;
            let text = clean_text(caps.get(3)?.as_str());
            if text.is_empty() {
                return None;
            }
            Some(TranscriptSegment {
                start,
                duration,
                text,
                lang: lang.to_string(),
            })
        })
        .collect()
}

/// `start`/`dur` are seconds; `t`/`d` are milliseconds.
fn cue_timing(attrs: &HashMap<String, String>) -> Option<(f64, Option<f64>)> {
    let number = |name: &str| attrs.get(name).and_then(|v| v.trim().parse::<f64>().ok());

    if let Some(start) = number("start") {
        return Some((start, number("dur")));
    }
    if let Some(t) = number("t") {
        return Some((t / 1000.0, number("d").map(|d| d / 1000.0)));
    }
    None
}

fn attributes(raw: &str) -> HashMap<String, String> {
    ATTR_RE
        .captures_iter(raw)
        .map(|caps| (caps[1].to_ascii_lowercase(), decode_entities(&caps[2])))
        .collect()
}

/// Strip markup, decode entities and collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    let without_tags = TAG_RE.replace_all(raw, "");
    let decoded = decode_entities(&without_tags);
    SPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Decode named and numeric HTML entities. Unknown entities are kept.
pub fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').filter(|&end| end <= 10) {
            Some(end) => match decode_entity(&tail[1..end]) {
                Some(c) => {
                    out.push(c);
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push('&');
                    rest = &tail[1..];
                }
            },
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        _ => return None,
    })
}
