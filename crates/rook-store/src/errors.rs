//! Error types for the session store.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// No record exists for the session.
    #[error("session record not found: {0}")]
    NotFound(String),

    /// A record with this identity already exists.
    #[error("session record already exists: {0}")]
    AlreadyExists(String),

    /// A stored row could not be decoded.
    #[error("corrupt record {id}: {message}")]
    Corrupt {
        /// Offending session.
        id: String,
        /// What failed to decode.
        message: String,
    },

    /// Internal error (e.g. injected failure).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
