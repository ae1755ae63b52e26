//! Suggestion records: the wire shape and the typed, classified shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One item of `data.list` as the suggestion endpoint returns it
///
/// Every field the endpoint may omit is optional here; the classifier decides
/// which ones matter for which kind.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSuggestion {
    /// Ordering key within the result set
    #[serde(default)]
    pub position: u32,
    /// Display title, possibly with highlight markup
    #[serde(default)]
    pub title: Option<String>,
    /// Text to search when the suggestion is picked
    #[serde(default)]
    pub keyword: String,
    /// Kind tag (1 general, 4 user, 5 topic, 8 season)
    #[serde(default)]
    pub term_type: Option<i64>,
    /// Free-form subtype label
    #[serde(default)]
    pub sug_type: Option<String>,
    /// Cover image, usually scheme-relative ("//i0.hdslb.com/...")
    #[serde(default)]
    pub cover: Option<String>,
    /// Deep link
    #[serde(default)]
    pub uri: Option<String>,
    /// Publish time, Unix seconds
    #[serde(default)]
    pub ptime: Option<i64>,
    /// Season type ("番剧", "电影", ...)
    #[serde(default)]
    pub season_type_name: Option<String>,
    /// Production area
    #[serde(default)]
    pub area: Option<String>,
    /// Badge label
    #[serde(default)]
    pub label: Option<String>,
    /// User level
    #[serde(default)]
    pub level: Option<u32>,
    /// Follower count
    #[serde(default)]
    pub fans: Option<u64>,
    /// Upload count
    #[serde(default)]
    pub archives: Option<u64>,
}

/// Envelope of a suggestion response
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SuggestResponse {
    /// Response payload; absent on API errors
    #[serde(default)]
    pub data: Option<SuggestData>,
}

/// Payload of a suggestion response
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SuggestData {
    /// Suggestions; absent when there is nothing to suggest
    #[serde(default)]
    pub list: Option<Vec<RawSuggestion>>,
}

/// A classified suggestion
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Suggestion {
    /// Ordering key; result sets are sorted ascending by it
    pub position: u32,
    /// Display title
    pub title: Option<String>,
    /// Text to search when picked
    pub keyword: String,
    /// Free-form subtype label
    pub sug_type: Option<String>,
    /// Kind and kind-specific payload
    pub kind: SuggestionKind,
}

/// Kind of a suggestion, decided once at classification time
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuggestionKind {
    /// Plain keyword completion
    General,
    /// A season (series, film)
    Season(SeasonDetails),
    /// A user
    User(UserDetails),
    /// A topic
    Topic,
    /// A tag this client does not know
    Unclassified {
        /// The unknown tag
        term_type: i64,
    },
}

/// Payload of a season suggestion
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SeasonDetails {
    /// Cover image URL with scheme
    pub cover: Option<String>,
    /// Deep link
    pub uri: Option<String>,
    /// Publish time
    pub published_at: Option<DateTime<Utc>>,
    /// Season type
    pub season_type_name: Option<String>,
    /// Production area
    pub area: Option<String>,
    /// Badge label
    pub label: Option<String>,
}

/// Payload of a user suggestion
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UserDetails {
    /// Avatar URL with scheme
    pub cover: Option<String>,
    /// Deep link
    pub uri: Option<String>,
    /// User level
    pub level: Option<u32>,
    /// Follower count
    pub fans: Option<u64>,
    /// Upload count
    pub archives: Option<u64>,
}

/// A query and the generation it was submitted as
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuggestionQuery {
    /// Text as typed
    pub text: String,
    /// Monotonic submission counter; only the latest generation is current
    pub generation: u64,
}
