//! The feed store: root atoms plus the derived views built on them.
//!
//! A [`FeedStore`] owns one dependency graph. Its upstream edges:
//!
//! ```text
//! visible_feeds        <- feeds, settings
//! filtered_feeds       <- visible_feeds, filter, unread_counts, starred_counts
//! feeds_by_category    <- filtered_feeds, unread_counts, starred_counts
//! category_count       <- filter, unread_counts, starred_counts
//! feed_count           <- filter, unread_counts, starred_counts
//! total_unread_count   <- unread_counts
//! total_starred_count  <- starred_counts
//! category_state       <- feeds
//! ```
//!
//! Settings and filter atoms are owned by the caller and passed in, so the
//! same cells can drive other parts of an application.
use std::sync::Arc;

use crate::derivations::{self, CategoryCounter, CountSnapshot, FeedCounter};
use crate::model::{CategoryGroup, CategoryRef, CountMap, Feed, FilterMode, LoadState, Settings};
use crate::reactive::{Atom, Computed, Runtime};

pub struct FeedStore {
    runtime: Runtime,

    // ========================================================================
    // Root State
    // ========================================================================
    /// Every feed from the last successful feed fetch.
    pub feeds: Atom<Arc<Vec<Feed>>>,
    /// Message of the last failed load, cleared when a load starts.
    pub error: Atom<Option<String>>,
    pub unread_counts: Atom<Arc<CountMap>>,
    pub starred_counts: Atom<Arc<CountMap>>,
    pub load_state: Atom<LoadState>,
    pub settings: Atom<Settings>,
    pub filter: Atom<FilterMode>,

    // ========================================================================
    // Derived State
    // ========================================================================
    pub visible_feeds: Computed<Arc<Vec<Feed>>>,
    pub filtered_feeds: Computed<Arc<Vec<Feed>>>,
    pub feeds_by_category: Computed<Arc<Vec<CategoryGroup>>>,
    pub category_count: Computed<CategoryCounter>,
    pub feed_count: Computed<FeedCounter>,
    pub total_unread_count: Computed<u64>,
    pub total_starred_count: Computed<u64>,
    pub category_state: Computed<Arc<Vec<CategoryRef>>>,

    /// Held for the whole of a load so concurrent loads run one at a time.
    pub(crate) load_guard: tokio::sync::Mutex<()>,
}

impl FeedStore {
    /// Build the graph on `runtime`.
    ///
    /// `settings` and `filter` must belong to the same runtime.
    pub fn new(runtime: &Runtime, settings: Atom<Settings>, filter: Atom<FilterMode>) -> Self {
        debug_assert!(settings.runtime().same(runtime));
        debug_assert!(filter.runtime().same(runtime));

        let feeds: Atom<Arc<Vec<Feed>>> = Atom::new(runtime, Arc::new(Vec::new()));
        let error = Atom::new(runtime, None);
        let unread_counts: Atom<Arc<CountMap>> = Atom::new(runtime, Arc::default());
        let starred_counts: Atom<Arc<CountMap>> = Atom::new(runtime, Arc::default());
        let load_state = Atom::new(runtime, LoadState::Idle);

        let visible_feeds = Computed::new(
            runtime,
            (feeds.clone(), settings.clone()),
            |(feeds, settings)| Arc::new(derivations::visible_feeds(&feeds, &settings)),
        );

        let filtered_feeds = Computed::new(
            runtime,
            (
                visible_feeds.clone(),
                filter.clone(),
                unread_counts.clone(),
                starred_counts.clone(),
            ),
            |(visible, mode, unread, starred)| {
                Arc::new(derivations::filter_feeds(&visible, mode, &unread, &starred))
            },
        );

        let feeds_by_category = Computed::new(
            runtime,
            (filtered_feeds.clone(), unread_counts.clone(), starred_counts.clone()),
            |(filtered, unread, starred)| {
                Arc::new(derivations::group_by_category(&filtered, &unread, &starred))
            },
        );

        let category_count = Computed::new(
            runtime,
            (filter.clone(), unread_counts.clone(), starred_counts.clone()),
            |(mode, unread, starred)| CategoryCounter(CountSnapshot { mode, unread, starred }),
        );

        let feed_count = Computed::new(
            runtime,
            (filter.clone(), unread_counts.clone(), starred_counts.clone()),
            |(mode, unread, starred)| FeedCounter(CountSnapshot { mode, unread, starred }),
        );

        let total_unread_count = Computed::new(runtime, (unread_counts.clone(),), |(unread,)| {
            derivations::total(&unread)
        });

        let total_starred_count = Computed::new(runtime, (starred_counts.clone(),), |(starred,)| {
            derivations::total(&starred)
        });

        let category_state = Computed::new(runtime, (feeds.clone(),), |(feeds,)| {
            Arc::new(derivations::category_refs(&feeds))
        });

        tracing::debug!("Feed store graph built");

        Self {
            runtime: runtime.clone(),
            feeds,
            error,
            unread_counts,
            starred_counts,
            load_state,
            settings,
            filter,
            visible_feeds,
            filtered_feeds,
            feeds_by_category,
            category_count,
            feed_count,
            total_unread_count,
            total_starred_count,
            category_state,
            load_guard: tokio::sync::Mutex::new(()),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }
}

impl std::fmt::Debug for FeedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedStore")
            .field("feeds", &self.feeds.get().len())
            .field("load_state", &self.load_state.get())
            .field("filter", &self.filter.get())
            .field("error", &self.error.get())
            .finish_non_exhaustive()
    }
}
