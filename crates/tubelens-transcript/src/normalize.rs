//! Map provider JSON into [`TranscriptSegment`]s.
//!
//! Each JSON source has its own [`SegmentSchema`] naming where the item
//! list lives and which fields carry text, timing and language. Schema
//! lookup happens here so the chain never branches on field names.
//!
//! Timing rules:
//! - A field whose name says milliseconds (`startMs`, `duration_ms`) is
//!   always divided by 1000.
//! - Any other numeric value in the open range (1000, 10,000,000) is taken
//!   to be milliseconds and rescaled.
//! - A missing or non-numeric duration stays `None`.

use serde_json::Value;

use tubelens_models::TranscriptSegment;

/// How to read a numeric timing field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    /// Seconds or milliseconds, decided by magnitude
    Guess,
    Millis,
}

/// Field layout of one source's transcript payload.
#[derive(Debug, Clone, Copy)]
pub struct SegmentSchema {
    /// Top-level keys that may hold the item array, in lookup order
    pub lists: &'static [&'static str],
    pub text: &'static [&'static str],
    pub start: &'static [(&'static str, TimeUnit)],
    pub duration: &'static [(&'static str, TimeUnit)],
    /// End-time fields; duration is derived as `end - start`
    pub end: &'static [(&'static str, TimeUnit)],
    pub lang: &'static [&'static str],
}

/// Specialized transcript provider (`/transcript-with-url`).
pub const TRANSCRIPT_API_SCHEMA: SegmentSchema = SegmentSchema {
    lists: &["transcripts", "data", "items", "segments", "transcript"],
    text: &["text", "caption", "content"],
    start: &[
        ("start", TimeUnit::Guess),
        ("startMs", TimeUnit::Millis),
        ("offset", TimeUnit::Guess),
        ("start_time", TimeUnit::Guess),
    ],
    duration: &[
        ("duration", TimeUnit::Guess),
        ("dur", TimeUnit::Guess),
        ("duration_ms", TimeUnit::Millis),
    ],
    end: &[("endMs", TimeUnit::Millis)],
    lang: &["lang", "language"],
};

/// Caption endpoints on the primary metadata provider.
pub const PRIMARY_API_SCHEMA: SegmentSchema = SegmentSchema {
    lists: &["segments", "items", "data"],
    text: &["text", "caption", "content"],
    start: &[
        ("start", TimeUnit::Guess),
        ("startTime", TimeUnit::Guess),
        ("offset", TimeUnit::Guess),
    ],
    duration: &[("dur", TimeUnit::Guess), ("duration", TimeUnit::Guess)],
    end: &[],
    lang: &["lang"],
};

const MS_LOWER: f64 = 1_000.0;
const MS_UPPER: f64 = 10_000_000.0;

/// Convert a raw timing value to seconds.
pub fn to_seconds(value: f64, unit: TimeUnit) -> f64 {
    match unit {
        TimeUnit::Millis => value / 1000.0,
        TimeUnit::Guess if value > MS_LOWER && value < MS_UPPER => value / 1000.0,
        TimeUnit::Guess => value,
    }
}

/// Normalize a whole response body. Returns an empty list when no known
/// list key holds an array.
pub fn normalize_body(body: &Value, schema: &SegmentSchema, fallback_lang: &str) -> Vec<TranscriptSegment> {
    let Some(items) = schema
        .lists
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_array))
    else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| normalize_item(item, schema, fallback_lang))
        .collect()
}

/// One item, or `None` when it has no text.
pub fn normalize_item(item: &Value, schema: &SegmentSchema, fallback_lang: &str) -> Option<TranscriptSegment> {
    if !item.is_object() {
        return None;
    }

    let text = schema
        .text
        .iter()
        .find_map(|key| item.get(key).filter(|v| !v.is_null()))
        .and_then(text_of)?;

    let start_raw = first_number(item, schema.start);
    let start = start_raw.map(|(v, unit)| to_seconds(v, unit)).unwrap_or(0.0);

    let duration = match first_number(item, schema.duration) {
        Some((v, unit)) => Some(to_seconds(v, unit)),
        None => first_number(item, schema.end).map(|(end, unit)| {
            let begin = start_raw.map(|(v, start_unit)| raw_in(v, start_unit, unit)).unwrap_or(0.0);
            to_seconds((end - begin).max(0.0), unit)
        }),
    };

    let lang = schema
        .lang
        .iter()
        .find_map(|key| item.get(key).and_then(Value::as_str))
        .filter(|l| !l.is_empty())
        .unwrap_or(fallback_lang)
        .to_string();

    Some(TranscriptSegment {
        start,
        duration,
        text,
        lang,
    })
}

/// Express a start value in the unit of an end field so they subtract.
fn raw_in(value: f64, from: TimeUnit, to: TimeUnit) -> f64 {
    if from == to {
        return value;
    }
    match to {
        TimeUnit::Millis => to_seconds(value, from) * 1000.0,
        TimeUnit::Guess => value,
    }
}

fn first_number(item: &Value, fields: &[(&str, TimeUnit)]) -> Option<(f64, TimeUnit)> {
    fields.iter().find_map(|(key, unit)| {
        let value = item.get(key)?;
        if value.is_null() {
            return None;
        }
        Some((number_of(value)?, *unit))
    })
}

/// A JSON number or a numeric string.
fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite())
}

fn text_of(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
