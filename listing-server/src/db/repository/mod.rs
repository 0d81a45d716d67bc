//! Repository Module
//!
//! Plain async functions over `sqlx` for each table. Read helpers take the
//! pool, write helpers take `&mut SqliteConnection` so callers can run them
//! inside a transaction.

pub mod property;
pub mod property_image;

use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Byte storage outside the database (legacy upload folder)
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

impl From<std::io::Error> for RepoError {
    fn from(err: std::io::Error) -> Self {
        RepoError::Storage(err.to_string())
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
