use super::schema::Database;
use super::types::{NewArticle, StorageError};
use crate::model::FeedId;

impl Database {
    // ========================================================================
    // Article Operations
    // ========================================================================

    /// Store an article for a feed, returning its id.
    ///
    /// An existing `(feed_id, guid)` keeps its read/starred state and only has
    /// its metadata refreshed.
    pub async fn add_article(&self, feed_id: FeedId, article: &NewArticle) -> Result<i64, StorageError> {
        let now = chrono::Utc::now().timestamp();
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO articles (feed_id, guid, title, url, published, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(feed_id, guid) DO UPDATE SET
                title = excluded.title,
                url = excluded.url,
                published = excluded.published
            RETURNING id
        "#,
        )
        .bind(feed_id)
        .bind(&article.guid)
        .bind(&article.title)
        .bind(&article.url)
        .bind(article.published)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    // ========================================================================
    // Article Mutations
    // ========================================================================

    /// Mark article as read (idempotent), returns whether it was changed
    pub async fn mark_article_read(&self, article_id: i64) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE articles SET read = 1 WHERE id = ? AND read = 0")
            .bind(article_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Atomically toggle starred status, returning the new value
    pub async fn toggle_article_starred(&self, article_id: i64) -> Result<bool, StorageError> {
        let result: (bool,) = sqlx::query_as(
            r#"UPDATE articles SET starred = NOT starred WHERE id = ? RETURNING starred"#,
        )
        .bind(article_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(result.0)
    }

    /// Mark all articles of a feed as read, returns how many changed
    pub async fn mark_all_read_for_feed(&self, feed_id: FeedId) -> Result<u64, StorageError> {
        let result = sqlx::query("UPDATE articles SET read = 1 WHERE feed_id = ? AND read = 0")
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
