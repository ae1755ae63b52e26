//! Raw suggestion list to typed, ordered records.

use chrono::DateTime;

use super::model::{RawSuggestion, SeasonDetails, Suggestion, SuggestionKind, UserDetails};

/// `term_type` of a plain keyword completion
pub const TERM_GENERAL: i64 = 1;
/// `term_type` of a user
pub const TERM_USER: i64 = 4;
/// `term_type` of a topic
pub const TERM_TOPIC: i64 = 5;
/// `term_type` of a season
pub const TERM_SEASON: i64 = 8;

/// Classify every item and sort by position
///
/// The output has exactly one record per input item. Items sharing a position
/// keep their input order.
pub fn classify(raw: Vec<RawSuggestion>) -> Vec<Suggestion> {
    let mut suggestions: Vec<Suggestion> = raw.into_iter().map(classify_one).collect();
    suggestions.sort_by_key(|s| s.position);
    suggestions
}

/// Classify a single item by its `term_type`; a missing tag means General
pub fn classify_one(raw: RawSuggestion) -> Suggestion {
    let kind = match raw.term_type {
        None | Some(TERM_GENERAL) => SuggestionKind::General,
        Some(TERM_USER) => SuggestionKind::User(UserDetails {
            cover: absolute_cover(raw.cover.as_deref()),
            uri: raw.uri.clone(),
            level: raw.level,
            fans: raw.fans,
            archives: raw.archives,
        }),
        Some(TERM_TOPIC) => SuggestionKind::Topic,
        Some(TERM_SEASON) => SuggestionKind::Season(SeasonDetails {
            cover: absolute_cover(raw.cover.as_deref()),
            uri: raw.uri.clone(),
            published_at: raw.ptime.and_then(|t| DateTime::from_timestamp(t, 0)),
            season_type_name: raw.season_type_name.clone(),
            area: raw.area.clone(),
            label: raw.label.clone(),
        }),
        Some(other) => SuggestionKind::Unclassified { term_type: other },
    };

    Suggestion {
        position: raw.position,
        title: raw.title,
        keyword: raw.keyword,
        sug_type: raw.sug_type,
        kind,
    }
}

/// Covers come scheme-relative ("//host/path"); give them a scheme
fn absolute_cover(cover: Option<&str>) -> Option<String> {
    match cover {
        None | Some("") => None,
        Some(c) if c.starts_with("//") => Some(format!("https:{c}")),
        Some(c) => Some(c.to_string()),
    }
}
