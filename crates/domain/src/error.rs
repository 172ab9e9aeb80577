//! Domain error types.

use thiserror::Error;

use crate::status::OrderStatus;

/// Errors raised by entity-level validation, before any I/O happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A status transition outside the legal state machine.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Quantity must be a positive integer.
    #[error("invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Request failed basic validation.
    #[error("validation failed: {0}")]
    Validation(String),
}

impl DomainError {
    /// Builds the transition error for a rejected move.
    pub fn invalid_transition(from: OrderStatus, to: OrderStatus) -> Self {
        DomainError::InvalidTransition { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_error_message_names_both_states() {
        let err = DomainError::invalid_transition(OrderStatus::Shipped, OrderStatus::Pending);
        assert_eq!(
            err.to_string(),
            "invalid status transition from SHIPPED to PENDING"
        );
    }
}
