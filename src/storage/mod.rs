//! Storage collaborator for the feed loader.
//!
//! [`Storage`] is the seam the loader reads through; [`Database`] is the
//! SQLite implementation shipped with the crate.
use async_trait::async_trait;

use crate::model::{CountMap, Feed, FeedId};

mod articles;
mod categories;
mod feeds;
mod schema;
mod types;

pub use schema::Database;
pub use types::{FeedCategory, NewArticle, StorageError};

/// Unread and starred counts fetched together for a set of feeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedCounts {
    pub unread: CountMap,
    pub starred: CountMap,
}

/// Read side of a feed store.
///
/// `init` must be idempotent. `get_feeds` may return `None`, which callers
/// treat as an empty list.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn init(&self) -> Result<(), StorageError>;

    async fn get_feeds(&self) -> Result<Option<Vec<Feed>>, StorageError>;

    async fn get_unread_count(&self, feed_id: FeedId) -> Result<u64, StorageError>;

    async fn get_starred_count(&self, feed_id: FeedId) -> Result<u64, StorageError>;

    /// Fetch both counts for every feed in `feed_ids`.
    ///
    /// The default walks the feeds in order, asking for the unread then the
    /// starred count of each. Backends that can answer in one round trip
    /// should override it. Every requested id gets an entry in both maps.
    async fn get_counts(&self, feed_ids: &[FeedId]) -> Result<FeedCounts, StorageError> {
        let mut counts = FeedCounts::default();
        for &feed_id in feed_ids {
            let unread = self.get_unread_count(feed_id).await?;
            counts.unread.insert(feed_id, unread);
            let starred = self.get_starred_count(feed_id).await?;
            counts.starred.insert(feed_id, starred);
        }
        Ok(counts)
    }
}

#[async_trait]
impl Storage for Database {
    async fn init(&self) -> Result<(), StorageError> {
        Database::init(self).await
    }

    async fn get_feeds(&self) -> Result<Option<Vec<Feed>>, StorageError> {
        Ok(Some(self.list_feeds().await?))
    }

    async fn get_unread_count(&self, feed_id: FeedId) -> Result<u64, StorageError> {
        self.unread_count(feed_id).await
    }

    async fn get_starred_count(&self, feed_id: FeedId) -> Result<u64, StorageError> {
        self.starred_count(feed_id).await
    }

    async fn get_counts(&self, feed_ids: &[FeedId]) -> Result<FeedCounts, StorageError> {
        self.counts_for_feeds(feed_ids).await
    }
}
