//! Feed loading: pulls feeds and counts from a [`Storage`] into a
//! [`FeedStore`].
use std::sync::Arc;
use thiserror::Error;

use crate::derivations;
use crate::model::{FeedId, LoadState};
use crate::storage::{FeedCounts, Storage, StorageError};
use crate::store::FeedStore;

/// Message published to the error atom when a load fails.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load feeds";

// ============================================================================
// Error Types
// ============================================================================

/// A failed load, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to initialize storage")]
    Init(#[source] StorageError),

    #[error("Failed to fetch feeds")]
    Feeds(#[source] StorageError),

    #[error("Failed to fetch feed counts")]
    Counts(#[source] StorageError),
}

impl LoadError {
    pub fn storage_error(&self) -> &StorageError {
        match self {
            LoadError::Init(e) | LoadError::Feeds(e) | LoadError::Counts(e) => e,
        }
    }
}

/// What a successful load published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Feeds published to the feeds atom.
    pub feeds: usize,
    /// Feeds whose counts were fetched.
    pub counted: usize,
    pub unread_total: u64,
    pub starred_total: u64,
}

// ============================================================================
// Load Orchestration
// ============================================================================

impl FeedStore {
    /// Reload feeds and their counts from `storage`.
    ///
    /// The feed list is published as soon as it arrives; the count maps follow
    /// in one batch once every visible feed has been counted. Until then
    /// subscribers may see the new feeds with the previous counts.
    ///
    /// On failure the error atom holds [`LOAD_FAILED_MESSAGE`], the count maps
    /// keep their previous values and the typed error is returned. Calls made
    /// while a load is running wait for it to finish.
    pub async fn load_feeds(&self, storage: &dyn Storage) -> Result<LoadSummary, LoadError> {
        let _in_flight = self.load_guard.lock().await;

        self.runtime().batch(|| {
            self.error.set(None);
            self.load_state.set(LoadState::Loading);
        });

        match self.fetch_and_publish(storage).await {
            Ok(summary) => {
                tracing::info!(
                    feeds = summary.feeds,
                    counted = summary.counted,
                    unread = summary.unread_total,
                    starred = summary.starred_total,
                    "Feeds loaded"
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(error = %e, cause = %e.storage_error(), "Feed load failed");
                self.runtime().batch(|| {
                    self.error.set(Some(LOAD_FAILED_MESSAGE.to_string()));
                    self.load_state.set(LoadState::Failed);
                });
                Err(e)
            }
        }
    }

    async fn fetch_and_publish(&self, storage: &dyn Storage) -> Result<LoadSummary, LoadError> {
        storage.init().await.map_err(LoadError::Init)?;

        let feeds = storage
            .get_feeds()
            .await
            .map_err(LoadError::Feeds)?
            .unwrap_or_default();
        let feed_total = feeds.len();
        self.feeds.set(Arc::new(feeds));
        tracing::debug!(feeds = feed_total, "Published feed list");

        // Settings are read now, so a toggle made during the fetch below does
        // not change which feeds get counted.
        let visible: Vec<FeedId> = self.visible_feeds.get().iter().map(|f| f.id).collect();
        let FeedCounts { unread, starred } = storage
            .get_counts(&visible)
            .await
            .map_err(LoadError::Counts)?;

        let summary = LoadSummary {
            feeds: feed_total,
            counted: visible.len(),
            unread_total: derivations::total(&unread),
            starred_total: derivations::total(&starred),
        };

        self.runtime().batch(|| {
            self.unread_counts.set(Arc::new(unread));
            self.starred_counts.set(Arc::new(starred));
            self.load_state.set(LoadState::Ready);
        });

        Ok(summary)
    }
}
