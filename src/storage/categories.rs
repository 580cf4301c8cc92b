use super::schema::Database;
use super::types::{FeedCategory, StorageError};
use crate::model::FeedId;

impl Database {
    // ========================================================================
    // Category Operations
    // ========================================================================

    /// Strip control characters and surrounding whitespace; reject empty names.
    fn sanitize_category_name(name: &str) -> Result<String, StorageError> {
        let cleaned: String = name.chars().filter(|c| !c.is_control()).collect();
        let trimmed = cleaned.trim();
        if trimmed.is_empty() {
            return Err(StorageError::Invalid(
                "Category name cannot be empty or whitespace-only".to_string(),
            ));
        }
        Ok(trimmed.to_owned())
    }

    /// Create a category, or return the id of the existing one with that name.
    pub async fn create_category(&self, name: &str) -> Result<i64, StorageError> {
        let clean_name = Self::sanitize_category_name(name)?;

        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO categories (name) VALUES (?)
            ON CONFLICT(name) DO UPDATE SET name = excluded.name
            RETURNING id
        "#,
        )
        .bind(&clean_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    pub async fn rename_category(&self, id: i64, new_name: &str) -> Result<(), StorageError> {
        let clean_name = Self::sanitize_category_name(new_name)?;

        sqlx::query("UPDATE categories SET name = ? WHERE id = ?")
            .bind(&clean_name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a category. Its feeds become uncategorized.
    pub async fn delete_category(&self, id: i64) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE feeds SET category_id = NULL WHERE category_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Move a feed into a category, or out of any category with `None`.
    pub async fn move_feed_to_category(
        &self,
        feed_id: FeedId,
        category_id: Option<i64>,
    ) -> Result<(), StorageError> {
        sqlx::query("UPDATE feeds SET category_id = ? WHERE id = ?")
            .bind(category_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_categories(&self) -> Result<Vec<FeedCategory>, StorageError> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, name FROM categories ORDER BY name COLLATE NOCASE")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| FeedCategory { id, name })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, StorageError};

    async fn test_db() -> Database {
        let db = Database::open(":memory:").await.unwrap();
        db.init().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_create_category_is_idempotent_by_name() {
        let db = test_db().await;
        let first = db.create_category("Tech").await.unwrap();
        let second = db.create_category("  Tech ").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(db.list_categories().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let db = test_db().await;
        let err = db.create_category(" \t\n").await.unwrap_err();
        assert!(matches!(err, StorageError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_control_chars_stripped() {
        let db = test_db().await;
        let id = db.create_category("\x1b[31mNews").await.unwrap();
        let categories = db.list_categories().await.unwrap();
        assert_eq!(categories[0].id, id);
        assert_eq!(categories[0].name, "[31mNews");
    }

    #[tokio::test]
    async fn test_rename_category() {
        let db = test_db().await;
        let id = db.create_category("Old").await.unwrap();
        db.rename_category(id, "New").await.unwrap();
        assert_eq!(db.list_categories().await.unwrap()[0].name, "New");
    }

    #[tokio::test]
    async fn test_delete_category_uncategorizes_feeds() {
        let db = test_db().await;
        let feed_id = db
            .insert_feed("https://example.com/rss", "Feed", None)
            .await
            .unwrap();
        let cat_id = db.create_category("Disposable").await.unwrap();
        db.move_feed_to_category(feed_id, Some(cat_id)).await.unwrap();

        db.delete_category(cat_id).await.unwrap();

        let feeds = db.list_feeds().await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].category_id, None);
        assert_eq!(feeds[0].category_name, None);
        assert!(db.list_categories().await.unwrap().is_empty());
    }
}
