use thiserror::Error;

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure, including constraint violations
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A persisted value no current code path could have written
    #[error("invalid stored value: {0}")]
    Corrupt(String),
}
