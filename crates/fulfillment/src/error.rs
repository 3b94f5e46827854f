//! Fulfillment error types.

use domain::{DomainError, OrderStatus};
use lock::LockError;
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by the ledger, the coordinator and the lifecycle manager.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// A referenced record does not exist (or is soft-deleted).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An outbound adjustment asked for more than is on hand.
    #[error("Insufficient stock. Current: {current}, requested: {requested}")]
    InsufficientStock { current: i64, requested: u32 },

    /// Another caller holds the lock for this key.
    #[error("Resource is busy, please try again: {key}")]
    ResourceBusy { key: String },

    /// The lock lease ran out before the transaction could commit.
    #[error("Lock lease expired before commit")]
    LockExpired,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStateTransition { from: OrderStatus, to: OrderStatus },

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Lock error: {0}")]
    Lock(LockError),
}

impl FulfillmentError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        FulfillmentError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<DomainError> for FulfillmentError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InsufficientStock { current, requested } => {
                FulfillmentError::InsufficientStock { current, requested }
            }
            DomainError::InvalidStateTransition { from, to } => {
                FulfillmentError::InvalidStateTransition { from, to }
            }
            DomainError::Validation(msg) => FulfillmentError::Validation(msg),
            other @ DomainError::UnknownValue { .. } => {
                FulfillmentError::Validation(other.to_string())
            }
        }
    }
}

impl From<StoreError> for FulfillmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { constraint } => FulfillmentError::DuplicateKey(constraint),
            StoreError::NotFound { entity, id } => FulfillmentError::NotFound { entity, id },
            other => FulfillmentError::Store(other),
        }
    }
}

impl From<LockError> for FulfillmentError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Busy { key } => FulfillmentError::ResourceBusy { key },
            other => FulfillmentError::Lock(other),
        }
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_names_current() {
        let err: FulfillmentError = DomainError::InsufficientStock {
            current: 3,
            requested: 5,
        }
        .into();

        assert!(err.to_string().contains("Current: 3"));
    }

    #[test]
    fn test_busy_lock_becomes_resource_busy() {
        let err: FulfillmentError = LockError::Busy {
            key: "lock:order:a:b".to_string(),
        }
        .into();

        assert!(matches!(err, FulfillmentError::ResourceBusy { key } if key == "lock:order:a:b"));
    }

    #[test]
    fn test_store_duplicate_keeps_constraint() {
        let err: FulfillmentError = StoreError::DuplicateKey {
            constraint: "products_sku_key".to_string(),
        }
        .into();

        assert!(matches!(err, FulfillmentError::DuplicateKey(c) if c == "products_sku_key"));
    }

    #[test]
    fn test_store_constraint_stays_internal() {
        let err: FulfillmentError = StoreError::ConstraintViolation("quantity".to_string()).into();

        assert!(matches!(err, FulfillmentError::Store(_)));
    }
}
