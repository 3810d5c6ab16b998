//! Error types for the lease lock library

use thiserror::Error;

/// Result type for lease operations
pub type LockResult<T> = Result<T, LockError>;

/// Errors that can occur while acquiring or releasing a lease
///
/// Contention is never an error: a lease held by someone else is reported as
/// `Ok(false)` from [`crate::RunLock::acquire`].
#[derive(Error, Debug)]
pub enum LockError {
    /// Database operation failed (connection, query execution, etc.)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Lock name or owner token failed validation
    #[error("Invalid lease key: {0}")]
    InvalidKey(String),

    /// TTL cannot be represented as a timestamp offset
    #[error("Invalid lease TTL: {0}")]
    InvalidTtl(String),
}
