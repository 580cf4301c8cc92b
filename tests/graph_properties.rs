//! Property-based tests for the feed store graph.
//!
//! Uses proptest to verify, over arbitrary feeds, counts, settings and
//! filters:
//! 1. Hidden feeds never reach the filtered view unless shown
//! 2. Count filters only keep feeds with a positive count
//! 3. Category grouping partitions the filtered view exactly
//! 4. Totals ignore the filter
//! 5. After any sequence of writes the graph agrees with a fresh derivation

use std::sync::Arc;

use feedstate::derivations;
use feedstate::model::{CountMap, Feed, FeedId, FilterMode, Settings};
use feedstate::reactive::{Atom, Runtime};
use feedstate::FeedStore;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn arb_feeds() -> impl Strategy<Value = Vec<Feed>> {
    prop::collection::vec((any::<bool>(), prop::option::of(0u8..4)), 0..24).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (hidden, category))| Feed {
                id: i as FeedId + 1,
                title: format!("Feed {}", i + 1),
                url: None,
                site_url: None,
                category_id: category.map(|c| format!("cat-{}", c)),
                category_name: category.map(|c| format!("Category {}", c)),
                hide_globally: hidden,
            })
            .collect()
    })
}

/// Sparse counts over feed ids 1..=24; absent ids read as zero.
fn arb_counts() -> impl Strategy<Value = CountMap> {
    prop::collection::hash_map(1i64..=24, 0u64..20, 0..24)
}

fn arb_mode() -> impl Strategy<Value = FilterMode> {
    prop::sample::select(FilterMode::ALL.to_vec())
}

#[derive(Debug, Clone)]
enum Step {
    Feeds(Vec<Feed>),
    Unread(CountMap),
    Starred(CountMap),
    ShowHidden(bool),
    Filter(FilterMode),
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        arb_feeds().prop_map(Step::Feeds),
        arb_counts().prop_map(Step::Unread),
        arb_counts().prop_map(Step::Starred),
        any::<bool>().prop_map(Step::ShowHidden),
        arb_mode().prop_map(Step::Filter),
    ]
}

fn build_store(
    feeds: Vec<Feed>,
    unread: CountMap,
    starred: CountMap,
    show_hidden: bool,
    mode: FilterMode,
) -> FeedStore {
    let rt = Runtime::new();
    let settings = Atom::new(
        &rt,
        Settings {
            show_hidden_feeds: show_hidden,
        },
    );
    let filter = Atom::new(&rt, mode);
    let store = FeedStore::new(&rt, settings, filter);
    store.feeds.set(Arc::new(feeds));
    store.unread_counts.set(Arc::new(unread));
    store.starred_counts.set(Arc::new(starred));
    store
}

// ============================================================================
// View Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn test_hidden_feeds_never_filtered_in(
        feeds in arb_feeds(),
        unread in arb_counts(),
        starred in arb_counts(),
        mode in arb_mode(),
    ) {
        let store = build_store(feeds, unread, starred, false, mode);
        prop_assert!(store.filtered_feeds.get().iter().all(|f| !f.hide_globally));
    }

    #[test]
    fn test_count_filters_keep_positive_counts(
        feeds in arb_feeds(),
        unread in arb_counts(),
        starred in arb_counts(),
        show_hidden in any::<bool>(),
    ) {
        let store = build_store(feeds, unread.clone(), starred.clone(), show_hidden, FilterMode::Unread);
        for feed in store.filtered_feeds.get().iter() {
            prop_assert!(derivations::count_of(&unread, feed.id) > 0);
        }

        store.filter.set(FilterMode::Starred);
        for feed in store.filtered_feeds.get().iter() {
            prop_assert!(derivations::count_of(&starred, feed.id) > 0);
        }

        store.filter.set(FilterMode::All);
        prop_assert_eq!(store.filtered_feeds.get(), store.visible_feeds.get());
    }

    #[test]
    fn test_grouping_partitions_filtered_feeds(
        feeds in arb_feeds(),
        unread in arb_counts(),
        starred in arb_counts(),
        show_hidden in any::<bool>(),
        mode in arb_mode(),
    ) {
        let store = build_store(feeds, unread, starred, show_hidden, mode);

        let mut filtered: Vec<FeedId> = store.filtered_feeds.get().iter().map(|f| f.id).collect();
        let groups = store.feeds_by_category.get();
        let mut grouped: Vec<FeedId> = groups
            .iter()
            .flat_map(|g| g.feeds.iter().map(|f| f.id))
            .collect();
        filtered.sort_unstable();
        grouped.sort_unstable();
        prop_assert_eq!(filtered, grouped);

        // Bucket ids are distinct and no bucket is empty.
        let mut ids: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
        let bucket_count = ids.len();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), bucket_count);
        prop_assert!(groups.iter().all(|g| !g.feeds.is_empty()));
    }

    #[test]
    fn test_totals_ignore_filter(
        feeds in arb_feeds(),
        unread in arb_counts(),
        starred in arb_counts(),
    ) {
        let expected_unread: u64 = unread.values().sum();
        let expected_starred: u64 = starred.values().sum();
        let store = build_store(feeds, unread, starred, false, FilterMode::All);

        for mode in FilterMode::ALL {
            store.filter.set(mode);
            prop_assert_eq!(store.total_unread_count.get(), expected_unread);
            prop_assert_eq!(store.total_starred_count.get(), expected_starred);
        }
    }
}

// ============================================================================
// Incremental Consistency
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_graph_matches_fresh_derivation(steps in prop::collection::vec(arb_step(), 1..16)) {
        let store = build_store(Vec::new(), CountMap::new(), CountMap::new(), false, FilterMode::All);

        // Subscribers force eager notification paths alongside lazy reads.
        let _grouped = store.feeds_by_category.subscribe(|_| {});
        let _totals = store.total_unread_count.subscribe(|_| {});

        for step in steps {
            match step {
                Step::Feeds(feeds) => store.feeds.set(Arc::new(feeds)),
                Step::Unread(counts) => store.unread_counts.set(Arc::new(counts)),
                Step::Starred(counts) => store.starred_counts.set(Arc::new(counts)),
                Step::ShowHidden(show) => store.settings.set(Settings { show_hidden_feeds: show }),
                Step::Filter(mode) => store.filter.set(mode),
            }
        }

        let feeds = store.feeds.get();
        let unread = store.unread_counts.get();
        let starred = store.starred_counts.get();
        let mode = store.filter.get();

        let visible = derivations::visible_feeds(&feeds, &store.settings.get());
        let filtered = derivations::filter_feeds(&visible, mode, &unread, &starred);
        let grouped = derivations::group_by_category(&filtered, &unread, &starred);

        prop_assert_eq!(&*store.visible_feeds.get(), &visible);
        prop_assert_eq!(&*store.filtered_feeds.get(), &filtered);
        prop_assert_eq!(&*store.feeds_by_category.get(), &grouped);
        prop_assert_eq!(store.total_unread_count.get(), derivations::total(&unread));
        prop_assert_eq!(
            &*store.category_state.get(),
            &derivations::category_refs(&feeds)
        );
        prop_assert_eq!(
            store.category_count.get().count(&filtered),
            derivations::category_count(mode, &unread, &starred, &filtered)
        );
    }
}
