use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Identifiers
// ============================================================================

pub type FeedId = i64;

/// Category identifiers are opaque strings; SQLite row ids are rendered as
/// decimal text.
pub type CategoryId = String;

/// Per-feed article counts. A feed with no entry counts as zero.
pub type CountMap = HashMap<FeedId, u64>;

/// Bucket id for feeds without a category.
pub const UNCATEGORIZED_ID: &str = "uncategorized";

/// Display name of the uncategorized bucket.
pub const UNCATEGORIZED_NAME: &str = "Uncategorized";

/// Link shown for a feed summary with no url.
pub const MISSING_LINK: &str = "#";

// ============================================================================
// Feed
// ============================================================================

/// Subscription as published to the feeds atom.
///
/// Replaced wholesale on every load; derivations never mutate entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub id: FeedId,
    pub title: String,
    pub url: Option<String>,
    pub site_url: Option<String>,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    #[serde(default)]
    pub hide_globally: bool,
}

impl Feed {
    /// Bucket this feed groups under. Absent or empty ids fall back to
    /// [`UNCATEGORIZED_ID`].
    pub fn category_key(&self) -> &str {
        match self.category_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => UNCATEGORIZED_ID,
        }
    }

    /// Category display name, or [`UNCATEGORIZED_NAME`].
    pub fn category_title(&self) -> &str {
        match self.category_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => UNCATEGORIZED_NAME,
        }
    }
}

// ============================================================================
// Filter Mode
// ============================================================================

/// View filter selected by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    All,
    Unread,
    Starred,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown filter mode '{0}' (expected all, unread or starred)")]
pub struct UnknownFilterMode(pub String);

impl FilterMode {
    pub const ALL: [FilterMode; 3] = [FilterMode::All, FilterMode::Unread, FilterMode::Starred];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMode::All => "all",
            FilterMode::Unread => "unread",
            FilterMode::Starred => "starred",
        }
    }

    /// Parse a mode from user input, falling back to [`FilterMode::All`].
    pub fn parse_lenient(s: &str) -> Self {
        match s.parse() {
            Ok(mode) => mode,
            Err(e) => {
                tracing::warn!(error = %e, "Falling back to the 'all' filter");
                FilterMode::All
            }
        }
    }
}

impl FromStr for FilterMode {
    type Err = UnknownFilterMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(FilterMode::All),
            "unread" => Ok(FilterMode::Unread),
            "starred" => Ok(FilterMode::Starred),
            _ => Err(UnknownFilterMode(s.to_string())),
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Display preferences held by the settings atom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Include feeds marked `hide_globally` in the view and in count loads.
    pub show_hidden_feeds: bool,
}

// ============================================================================
// Derived Views
// ============================================================================

/// One category bucket of the grouped feed view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryGroup {
    pub id: CategoryId,
    pub title: String,
    /// Always false when built; selection is tracked by the consumer.
    pub is_active: bool,
    pub feeds: Vec<FeedSummary>,
}

/// Feed entry inside a [`CategoryGroup`], annotated with its counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedSummary {
    pub id: FeedId,
    pub title: String,
    pub url: String,
    pub site_url: String,
    pub unread_count: u64,
    pub starred_count: u64,
}

/// Distinct `(id, name)` category pair across every loaded feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRef {
    pub id: Option<CategoryId>,
    pub name: Option<String>,
}

/// Progress of the feed loader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(category_id: Option<&str>, category_name: Option<&str>) -> Feed {
        Feed {
            id: 1,
            title: "Feed".to_string(),
            url: None,
            site_url: None,
            category_id: category_id.map(String::from),
            category_name: category_name.map(String::from),
            hide_globally: false,
        }
    }

    #[test]
    fn test_category_key_falls_back() {
        assert_eq!(feed(Some("a"), None).category_key(), "a");
        assert_eq!(feed(None, None).category_key(), UNCATEGORIZED_ID);
        assert_eq!(feed(Some(""), None).category_key(), UNCATEGORIZED_ID);
    }

    #[test]
    fn test_category_title_falls_back() {
        assert_eq!(feed(None, Some("News")).category_title(), "News");
        assert_eq!(feed(None, None).category_title(), UNCATEGORIZED_NAME);
        assert_eq!(feed(None, Some("")).category_title(), UNCATEGORIZED_NAME);
    }

    #[test]
    fn test_filter_mode_from_str() {
        assert_eq!("all".parse(), Ok(FilterMode::All));
        assert_eq!("Unread".parse(), Ok(FilterMode::Unread));
        assert_eq!(" starred ".parse(), Ok(FilterMode::Starred));
        assert_eq!(
            "recent".parse::<FilterMode>(),
            Err(UnknownFilterMode("recent".to_string()))
        );
    }

    #[test]
    fn test_filter_mode_lenient_defaults_to_all() {
        assert_eq!(FilterMode::parse_lenient("starred"), FilterMode::Starred);
        assert_eq!(FilterMode::parse_lenient("bogus"), FilterMode::All);
    }

    #[test]
    fn test_filter_mode_display_round_trips() {
        for mode in FilterMode::ALL {
            assert_eq!(mode.to_string().parse(), Ok(mode));
        }
    }

    #[test]
    fn test_feed_deserializes_without_hidden_flag() {
        let json = r#"{"id":3,"title":"T","url":null,"site_url":null,"category_id":null,"category_name":null}"#;
        let feed: Feed = serde_json::from_str(json).unwrap();
        assert!(!feed.hide_globally);
    }
}
