//! Payment gateway trait and simulated implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{Money, OrderId, TransactionId, UserId};
use thiserror::Error;

/// Transport-level failure: the gateway never produced a business decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request exceeded its deadline.
    #[error("payment request timed out after {0:?}")]
    Timeout(Duration),

    /// The gateway could not be reached.
    #[error("connection to payment gateway failed: {0}")]
    Connection(String),
}

/// The gateway's authoritative answer to a charge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// The charge went through; money has moved.
    Approved { transaction_id: TransactionId },
    /// The gateway refused the charge. Final for this attempt.
    Declined { reason: String },
}

/// The gateway's answer to a refund request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundOutcome {
    /// The refund went through.
    Refunded { refund_id: TransactionId },
    /// The refund was refused (unknown, declined, or already refunded).
    Rejected { reason: String },
}

/// Synchronous charge/refund contract offered by the payment collaborator.
///
/// A `Result::Err` is a transport failure and may be retried; an `Ok` carries
/// the gateway's final business decision for this attempt.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Attempts to charge a user for an order.
    async fn charge(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
    ) -> Result<ChargeOutcome, TransportError>;

    /// Refunds a previously approved charge.
    async fn refund(&self, transaction_id: TransactionId) -> Result<RefundOutcome, TransportError>;
}

#[derive(Debug, Clone)]
struct ChargeRecord {
    order_id: OrderId,
    approved: bool,
}

#[derive(Debug, Default)]
struct SimulatedState {
    charges: HashMap<TransactionId, ChargeRecord>,
    // original transaction id -> refund transaction id
    refunds: HashMap<TransactionId, TransactionId>,
}

/// In-process stand-in for the real payment collaborator.
///
/// The success probability is injected at construction, never ambient state,
/// so tests can substitute deterministic behavior. Two test-mode amounts
/// bypass the draw entirely: amounts ending in `.99` always decline and
/// amounts ending in `.00` always approve.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    success_rate: f64,
    state: Arc<RwLock<SimulatedState>>,
}

impl SimulatedGateway {
    /// Creates a gateway that approves with the given probability.
    pub fn new(success_rate: f64) -> Self {
        Self {
            success_rate,
            state: Arc::new(RwLock::new(SimulatedState::default())),
        }
    }

    /// Gateway that approves every well-formed charge.
    pub fn always_approve() -> Self {
        Self::new(1.0)
    }

    /// Gateway that declines every charge.
    pub fn always_decline() -> Self {
        Self::new(0.0)
    }

    /// Number of approved charges on record.
    pub fn approved_count(&self) -> usize {
        self.state
            .read()
            .unwrap()
            .charges
            .values()
            .filter(|c| c.approved)
            .count()
    }

    /// Number of refunds on record.
    pub fn refund_count(&self) -> usize {
        self.state.read().unwrap().refunds.len()
    }

    /// True if the given charge has been refunded.
    pub fn is_refunded(&self, transaction_id: TransactionId) -> bool {
        self.state.read().unwrap().refunds.contains_key(&transaction_id)
    }

    fn determine_outcome(&self, amount: Money) -> (bool, &'static str) {
        if amount.cents_part() == 99 {
            return (false, "card rejected (test amount)");
        }
        if amount.cents_part() == 0 {
            return (true, "approved");
        }
        if rand::random::<f64>() < self.success_rate {
            (true, "approved")
        } else {
            (false, "declined by bank")
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
    ) -> Result<ChargeOutcome, TransportError> {
        let _ = user_id;
        let mut state = self.state.write().unwrap();

        let already_paid = state
            .charges
            .values()
            .any(|c| c.approved && c.order_id == order_id);
        if already_paid {
            return Ok(ChargeOutcome::Declined {
                reason: format!("order {order_id} already has a successful payment"),
            });
        }

        let (approved, reason) = self.determine_outcome(amount);
        let transaction_id = TransactionId::new();
        state.charges.insert(
            transaction_id,
            ChargeRecord { order_id, approved },
        );

        if approved {
            tracing::debug!(%transaction_id, %order_id, %amount, "charge approved");
            Ok(ChargeOutcome::Approved { transaction_id })
        } else {
            tracing::debug!(%order_id, %amount, reason, "charge declined");
            Ok(ChargeOutcome::Declined {
                reason: reason.to_string(),
            })
        }
    }

    async fn refund(&self, transaction_id: TransactionId) -> Result<RefundOutcome, TransportError> {
        let mut state = self.state.write().unwrap();

        let Some(record) = state.charges.get(&transaction_id) else {
            return Ok(RefundOutcome::Rejected {
                reason: format!("payment not found: {transaction_id}"),
            });
        };
        if !record.approved {
            return Ok(RefundOutcome::Rejected {
                reason: "cannot refund a declined payment".to_string(),
            });
        }
        if state.refunds.contains_key(&transaction_id) {
            return Ok(RefundOutcome::Rejected {
                reason: "payment already refunded".to_string(),
            });
        }

        let refund_id = TransactionId::new();
        state.refunds.insert(transaction_id, refund_id);
        tracing::debug!(%transaction_id, %refund_id, "payment refunded");
        Ok(RefundOutcome::Refunded { refund_id })
    }
}
