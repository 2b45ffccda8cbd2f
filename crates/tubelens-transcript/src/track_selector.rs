//! Caption track ranking.
//!
//! Language preference dominates: matching the Nth preferred language is
//! worth `100 - N`. Human-authored tracks get a flat `+10`, which only
//! decides between tracks whose language scores are close or equal.

use tubelens_models::CaptionTrack;

const LANGUAGE_BASE: i32 = 100;
const HUMAN_BONUS: i32 = 10;

/// Score of one track against an ordered language preference.
pub fn score(track: &CaptionTrack, preferred: &[String]) -> i32 {
    let language = preferred
        .iter()
        .position(|lang| lang.eq_ignore_ascii_case(&track.lang_code))
        .map(|rank| LANGUAGE_BASE - rank as i32)
        .unwrap_or(0);
    let human = if track.is_auto() { 0 } else { HUMAN_BONUS };
    language + human
}

/// Highest-scoring track; ties go to the earliest in `tracks`.
pub fn choose<'a>(tracks: &'a [CaptionTrack], preferred: &[String]) -> Option<&'a CaptionTrack> {
    let mut best: Option<(i32, &CaptionTrack)> = None;
    for track in tracks {
        let s = score(track, preferred);
        if best.map_or(true, |(top, _)| s > top) {
            best = Some((s, track));
        }
    }
    best.map(|(_, track)| track)
}
