use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage errors with user-friendly messages
#[derive(Debug, Error)]
pub enum StorageError {
    /// Another process holds the database lock
    #[error("Another instance appears to be using the database. Please close it and try again.")]
    InstanceLocked,

    /// Backend could not be brought up
    #[error("Storage initialization failed: {0}")]
    Init(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A feed list or count could not be read
    #[error("Storage read failed: {0}")]
    Read(String),

    /// Rejected input (empty names and the like)
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StorageError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if Self::is_lock_message(&err.to_string()) {
            return StorageError::InstanceLocked;
        }
        StorageError::Database(err)
    }

    /// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) all surface
    /// as one of these messages.
    pub(crate) fn is_lock_message(message: &str) -> bool {
        let message = message.to_lowercase();
        message.contains("database is locked")
            || message.contains("database table is locked")
            || message.contains("sqlite_busy")
            || message.contains("sqlite_locked")
            || message.contains("unable to open database file")
    }
}

// ============================================================================
// Helper Types
// ============================================================================

/// Row type for the feed list query
pub(crate) type FeedRow = (
    i64,
    String,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<String>,
    bool,
);

/// Article to store for a feed
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub guid: String,
    pub title: String,
    pub url: Option<String>,
    pub published: Option<i64>,
}

/// Category row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCategory {
    pub id: i64,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_messages_detected() {
        assert!(StorageError::is_lock_message("database is locked"));
        assert!(StorageError::is_lock_message("error: SQLITE_BUSY"));
        assert!(StorageError::is_lock_message("Unable to open database file"));
        assert!(!StorageError::is_lock_message("no such table: feeds"));
    }

    #[test]
    fn test_error_messages() {
        let err = StorageError::Read("feed list".to_string());
        assert_eq!(err.to_string(), "Storage read failed: feed list");
        assert!(StorageError::InstanceLocked
            .to_string()
            .contains("Another instance"));
    }
}
