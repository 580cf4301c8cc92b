use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{FeedRow, StorageError};
use super::FeedCounts;
use crate::model::{Feed, FeedId};

/// Ids per `IN (...)` list, well under SQLite's 999 parameter limit.
const COUNT_BATCH_SIZE: usize = 500;

/// COUNT(*) is never negative; anything else reads as zero.
fn to_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a feed, or update title/site url when the url already exists.
    /// Returns the feed id.
    pub async fn insert_feed(
        &self,
        url: &str,
        title: &str,
        site_url: Option<&str>,
    ) -> Result<FeedId, StorageError> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feeds (title, url, site_url) VALUES (?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET title = excluded.title, site_url = excluded.site_url
            RETURNING id
        "#,
        )
        .bind(title)
        .bind(url)
        .bind(site_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    /// Delete a feed; its articles go with it (ON DELETE CASCADE).
    pub async fn delete_feed(&self, feed_id: FeedId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Hide or unhide a feed everywhere the view honours `hide_globally`.
    pub async fn set_feed_hidden(&self, feed_id: FeedId, hidden: bool) -> Result<(), StorageError> {
        sqlx::query("UPDATE feeds SET hide_globally = ? WHERE id = ?")
            .bind(hidden)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All feeds with their category, ordered by title.
    pub async fn list_feeds(&self) -> Result<Vec<Feed>, StorageError> {
        let rows: Vec<FeedRow> = sqlx::query_as(
            r#"
                SELECT
                    f.id, f.title, f.url, f.site_url, f.category_id, c.name, f.hide_globally
                FROM feeds f
                LEFT JOIN categories c ON c.id = f.category_id
                ORDER BY f.title COLLATE NOCASE, f.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let feeds = rows
            .into_iter()
            .map(
                |(id, title, url, site_url, category_id, category_name, hide_globally)| Feed {
                    id,
                    title,
                    url,
                    site_url,
                    category_id: category_id.map(|c| c.to_string()),
                    category_name,
                    hide_globally,
                },
            )
            .collect();

        Ok(feeds)
    }

    // ========================================================================
    // Count Queries
    // ========================================================================

    pub async fn unread_count(&self, feed_id: FeedId) -> Result<u64, StorageError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM articles WHERE feed_id = ? AND read = 0")
                .bind(feed_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(to_count(row.0))
    }

    pub async fn starred_count(&self, feed_id: FeedId) -> Result<u64, StorageError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM articles WHERE feed_id = ? AND starred = 1")
                .bind(feed_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(to_count(row.0))
    }

    /// Unread and starred counts for many feeds in one grouped query per
    /// chunk of ids, instead of two round trips per feed.
    ///
    /// Feeds without articles still get a zero entry in both maps.
    pub async fn counts_for_feeds(&self, feed_ids: &[FeedId]) -> Result<FeedCounts, StorageError> {
        let mut counts = FeedCounts::default();
        for &feed_id in feed_ids {
            counts.unread.insert(feed_id, 0);
            counts.starred.insert(feed_id, 0);
        }

        for chunk in feed_ids.chunks(COUNT_BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "SELECT feed_id, \
                 COUNT(CASE WHEN read = 0 THEN 1 END), \
                 COUNT(CASE WHEN starred = 1 THEN 1 END) \
                 FROM articles WHERE feed_id IN (",
            );
            let mut separated = builder.separated(", ");
            for feed_id in chunk {
                separated.push_bind(*feed_id);
            }
            separated.push_unseparated(") GROUP BY feed_id");

            let rows: Vec<(i64, i64, i64)> = builder.build_query_as().fetch_all(&self.pool).await?;
            for (feed_id, unread, starred) in rows {
                counts.unread.insert(feed_id, to_count(unread));
                counts.starred.insert(feed_id, to_count(starred));
            }
        }

        tracing::debug!(feeds = feed_ids.len(), "Fetched feed counts");
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, NewArticle, Storage};

    async fn test_db() -> Database {
        let db = Database::open(":memory:").await.unwrap();
        db.init().await.unwrap();
        db
    }

    fn article(guid: &str) -> NewArticle {
        NewArticle {
            guid: guid.to_string(),
            title: format!("Article {}", guid),
            url: None,
            published: Some(1700000000),
        }
    }

    #[tokio::test]
    async fn test_insert_feed_upserts_on_url() {
        let db = test_db().await;
        let id1 = db
            .insert_feed("https://example.com/rss", "Old", None)
            .await
            .unwrap();
        let id2 = db
            .insert_feed("https://example.com/rss", "New", Some("https://example.com"))
            .await
            .unwrap();
        assert_eq!(id1, id2);

        let feeds = db.list_feeds().await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].title, "New");
        assert_eq!(feeds[0].site_url.as_deref(), Some("https://example.com"));
        assert_eq!(feeds[0].category_id, None);
        assert!(!feeds[0].hide_globally);
    }

    #[tokio::test]
    async fn test_list_feeds_includes_category() {
        let db = test_db().await;
        let feed_id = db
            .insert_feed("https://example.com/rss", "Feed", None)
            .await
            .unwrap();
        let cat_id = db.create_category("News").await.unwrap();
        db.move_feed_to_category(feed_id, Some(cat_id)).await.unwrap();

        let feeds = db.list_feeds().await.unwrap();
        assert_eq!(feeds[0].category_id, Some(cat_id.to_string()));
        assert_eq!(feeds[0].category_name.as_deref(), Some("News"));
    }

    #[tokio::test]
    async fn test_set_feed_hidden() {
        let db = test_db().await;
        let feed_id = db
            .insert_feed("https://example.com/rss", "Feed", None)
            .await
            .unwrap();
        db.set_feed_hidden(feed_id, true).await.unwrap();
        assert!(db.list_feeds().await.unwrap()[0].hide_globally);
    }

    #[tokio::test]
    async fn test_counts_match_single_queries() {
        let db = test_db().await;
        let a = db.insert_feed("https://a.example.com/rss", "A", None).await.unwrap();
        let b = db.insert_feed("https://b.example.com/rss", "B", None).await.unwrap();
        let empty = db.insert_feed("https://c.example.com/rss", "C", None).await.unwrap();

        let a1 = db.add_article(a, &article("1")).await.unwrap();
        db.add_article(a, &article("2")).await.unwrap();
        let b1 = db.add_article(b, &article("1")).await.unwrap();
        db.mark_article_read(a1).await.unwrap();
        db.toggle_article_starred(a1).await.unwrap();
        db.toggle_article_starred(b1).await.unwrap();

        let batch = db.counts_for_feeds(&[a, b, empty]).await.unwrap();
        assert_eq!(batch.unread[&a], 1);
        assert_eq!(batch.unread[&b], 1);
        assert_eq!(batch.unread[&empty], 0);
        assert_eq!(batch.starred[&a], 1);
        assert_eq!(batch.starred[&b], 1);
        assert_eq!(batch.starred[&empty], 0);

        for id in [a, b, empty] {
            assert_eq!(db.unread_count(id).await.unwrap(), batch.unread[&id]);
            assert_eq!(db.starred_count(id).await.unwrap(), batch.starred[&id]);
        }
    }

    #[tokio::test]
    async fn test_counts_for_no_feeds() {
        let db = test_db().await;
        let counts = db.counts_for_feeds(&[]).await.unwrap();
        assert!(counts.unread.is_empty());
        assert!(counts.starred.is_empty());
    }

    #[tokio::test]
    async fn test_storage_trait_returns_feed_list() {
        let db = test_db().await;
        db.insert_feed("https://example.com/rss", "Feed", None)
            .await
            .unwrap();
        let feeds = Storage::get_feeds(&db).await.unwrap().unwrap();
        assert_eq!(feeds.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_feed_removes_articles() {
        let db = test_db().await;
        let feed_id = db
            .insert_feed("https://example.com/rss", "Feed", None)
            .await
            .unwrap();
        db.add_article(feed_id, &article("1")).await.unwrap();

        assert!(db.delete_feed(feed_id).await.unwrap());
        assert!(db.list_feeds().await.unwrap().is_empty());
        assert_eq!(db.unread_count(feed_id).await.unwrap(), 0);
    }
}
