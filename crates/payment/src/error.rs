//! Payment error types.

use common::TransactionId;
use thiserror::Error;

/// Errors surfaced by the payment client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// The gateway gave a definitive business refusal. Never retried.
    #[error("payment declined: {reason}")]
    Declined { reason: String },

    /// Transport failures exhausted the retry budget.
    #[error("payment gateway unreachable: {0}")]
    Transport(String),

    /// The circuit breaker is open; no request was attempted.
    #[error("payment gateway circuit is open")]
    CircuitOpen,

    /// The gateway refused to refund the transaction.
    #[error("refund of {transaction_id} rejected: {reason}")]
    RefundRejected {
        transaction_id: TransactionId,
        reason: String,
    },
}

impl PaymentError {
    /// True for failures where the gateway never made a business decision.
    pub fn is_transport(&self) -> bool {
        matches!(self, PaymentError::Transport(_) | PaymentError::CircuitOpen)
    }
}

/// Convenience type alias for payment results.
pub type Result<T> = std::result::Result<T, PaymentError>;
