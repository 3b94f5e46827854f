use thiserror::Error;

/// Errors that can occur when acquiring or releasing a lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// The key is already held by someone else.
    #[error("Resource is busy: {key}")]
    Busy { key: String },

    /// The backing key-value store failed.
    #[error("Lock backend error: {0}")]
    Backend(#[from] ::redis::RedisError),
}

/// Result type for lock operations.
pub type Result<T> = std::result::Result<T, LockError>;
