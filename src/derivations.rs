//! Pure derivations behind the computed nodes of [`crate::store::FeedStore`].
//!
//! Every function here is total: missing count entries read as zero and
//! feeds without a category land in the uncategorized bucket.
use indexmap::IndexMap;
use std::sync::Arc;

use crate::model::{
    CategoryGroup, CategoryId, CategoryRef, CountMap, Feed, FeedId, FeedSummary, FilterMode,
    Settings, MISSING_LINK,
};

/// Count for `feed_id`, zero when absent.
pub fn count_of(counts: &CountMap, feed_id: FeedId) -> u64 {
    counts.get(&feed_id).copied().unwrap_or(0)
}

// ============================================================================
// Filtering
// ============================================================================

/// Feeds the user can see under `settings`, in input order.
pub fn visible_feeds(feeds: &[Feed], settings: &Settings) -> Vec<Feed> {
    if settings.show_hidden_feeds {
        return feeds.to_vec();
    }
    feeds.iter().filter(|f| !f.hide_globally).cloned().collect()
}

/// Narrow visible feeds by the active filter.
///
/// `unread` and `starred` keep feeds with a positive count in the matching
/// map; `all` keeps everything.
pub fn filter_feeds(
    visible: &[Feed],
    mode: FilterMode,
    unread: &CountMap,
    starred: &CountMap,
) -> Vec<Feed> {
    visible
        .iter()
        .filter(|feed| match mode {
            FilterMode::Starred => count_of(starred, feed.id) > 0,
            FilterMode::Unread => count_of(unread, feed.id) > 0,
            FilterMode::All => true,
        })
        .cloned()
        .collect()
}

// ============================================================================
// Grouping
// ============================================================================

/// Partition feeds into category buckets.
///
/// Buckets appear in the order their first member appears. The bucket title
/// comes from that first member.
pub fn group_by_category(feeds: &[Feed], unread: &CountMap, starred: &CountMap) -> Vec<CategoryGroup> {
    let mut groups: IndexMap<&str, CategoryGroup> = IndexMap::new();

    for feed in feeds {
        let group = groups
            .entry(feed.category_key())
            .or_insert_with(|| CategoryGroup {
                id: feed.category_key().to_string(),
                title: feed.category_title().to_string(),
                is_active: false,
                feeds: Vec::new(),
            });
        group.feeds.push(summarize(feed, unread, starred));
    }

    groups.into_values().collect()
}

fn summarize(feed: &Feed, unread: &CountMap, starred: &CountMap) -> FeedSummary {
    FeedSummary {
        id: feed.id,
        title: feed.title.clone(),
        url: link_or_placeholder(feed.url.as_deref()),
        site_url: link_or_placeholder(feed.site_url.as_deref()),
        unread_count: count_of(unread, feed.id),
        starred_count: count_of(starred, feed.id),
    }
}

fn link_or_placeholder(link: Option<&str>) -> String {
    match link {
        Some(link) if !link.is_empty() => link.to_string(),
        _ => MISSING_LINK.to_string(),
    }
}

/// Distinct categories over all feeds, hidden ones included.
///
/// Keyed by the raw category id, so every feed without one shares a single
/// entry. A later feed's name replaces an earlier one; position stays where
/// the id was first seen.
pub fn category_refs(feeds: &[Feed]) -> Vec<CategoryRef> {
    let mut unique: IndexMap<Option<&CategoryId>, CategoryRef> = IndexMap::new();
    for feed in feeds {
        unique.insert(
            feed.category_id.as_ref(),
            CategoryRef {
                id: feed.category_id.clone(),
                name: feed.category_name.clone(),
            },
        );
    }
    unique.into_values().collect()
}

// ============================================================================
// Counting
// ============================================================================

/// Map the active filter reads counts from.
///
/// Only `starred` reads starred counts; `unread` and `all` both read unread.
fn counts_for<'a>(mode: FilterMode, unread: &'a CountMap, starred: &'a CountMap) -> &'a CountMap {
    match mode {
        FilterMode::Starred => starred,
        FilterMode::Unread | FilterMode::All => unread,
    }
}

/// Sum of the filter-relevant counts over `feeds`.
pub fn category_count(mode: FilterMode, unread: &CountMap, starred: &CountMap, feeds: &[Feed]) -> u64 {
    let counts = counts_for(mode, unread, starred);
    feeds
        .iter()
        .fold(0u64, |sum, feed| sum.saturating_add(count_of(counts, feed.id)))
}

/// Filter-relevant count of a single feed.
pub fn feed_count(mode: FilterMode, unread: &CountMap, starred: &CountMap, feed_id: FeedId) -> u64 {
    count_of(counts_for(mode, unread, starred), feed_id)
}

/// Sum of every value in `counts`, independent of any filter.
pub fn total(counts: &CountMap) -> u64 {
    counts.values().fold(0u64, |sum, n| sum.saturating_add(*n))
}

/// Counts and filter captured at one recomputation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountSnapshot {
    pub mode: FilterMode,
    pub unread: Arc<CountMap>,
    pub starred: Arc<CountMap>,
}

/// Per-category count query over a [`CountSnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryCounter(pub CountSnapshot);

impl CategoryCounter {
    pub fn count(&self, feeds: &[Feed]) -> u64 {
        let snap = &self.0;
        category_count(snap.mode, &snap.unread, &snap.starred, feeds)
    }
}

/// Per-feed count query over a [`CountSnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedCounter(pub CountSnapshot);

impl FeedCounter {
    pub fn count(&self, feed_id: FeedId) -> u64 {
        let snap = &self.0;
        feed_count(snap.mode, &snap.unread, &snap.starred, feed_id)
    }
}
