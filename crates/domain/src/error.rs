//! Domain error types.

use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised by domain rules, independent of persistence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Input failed a domain validation rule.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Order is not allowed to move from `from` to `to`.
    #[error("Invalid state transition: cannot move order from {from} to {to}")]
    InvalidStateTransition { from: OrderStatus, to: OrderStatus },

    /// A decrement would take stock below zero.
    #[error("Insufficient stock. Current: {current}, requested: {requested}")]
    InsufficientStock { current: i64, requested: u32 },

    /// A textual enum value was not recognised.
    #[error("Unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },
}

impl DomainError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }
}
