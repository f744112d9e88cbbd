//! Fault-tolerant client over a payment gateway.

use std::time::Duration;

use common::{Money, OrderId, TransactionId, UserId};

use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::error::{PaymentError, Result};
use crate::gateway::{ChargeOutcome, PaymentGateway, RefundOutcome, TransportError};

/// Bounded retry with exponential backoff, applied to transport errors only.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, Copy)]
pub struct PaymentClientConfig {
    /// Per-attempt deadline; exceeding it counts as a transport failure.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub breaker: BreakerConfig,
}

impl PaymentClientConfig {
    /// Sensible production defaults with a 30s per-attempt deadline.
    pub fn new() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

impl Default for PaymentClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps a gateway with timeout, retry, and circuit-breaker behavior.
///
/// A definitive Approved/Declined is authoritative and final per attempt:
/// it is returned immediately and never retried. Only transport failures
/// burn retry budget.
pub struct PaymentClient<G> {
    gateway: G,
    config: PaymentClientConfig,
    breaker: CircuitBreaker,
}

impl<G: PaymentGateway> PaymentClient<G> {
    /// Creates a client over the given gateway.
    pub fn new(gateway: G, config: PaymentClientConfig) -> Self {
        Self {
            gateway,
            breaker: CircuitBreaker::new(config.breaker),
            config,
        }
    }

    /// Returns the wrapped gateway.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Charges a user for an order, returning the gateway transaction id.
    #[tracing::instrument(skip(self))]
    pub async fn charge(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
    ) -> Result<TransactionId> {
        if !self.breaker.can_execute() {
            metrics::counter!("payment_rejected_circuit_open_total").increment(1);
            return Err(PaymentError::CircuitOpen);
        }

        let outcome = self
            .with_retries(|| self.gateway.charge(order_id, user_id, amount))
            .await;

        match outcome {
            Ok(ChargeOutcome::Approved { transaction_id }) => {
                self.breaker.record_success();
                tracing::info!(%transaction_id, %order_id, %amount, "payment approved");
                Ok(transaction_id)
            }
            Ok(ChargeOutcome::Declined { reason }) => {
                // The gateway answered; the circuit is healthy.
                self.breaker.record_success();
                tracing::info!(%order_id, reason, "payment declined");
                Err(PaymentError::Declined { reason })
            }
            Err(transport) => {
                self.breaker.record_failure();
                tracing::warn!(%order_id, error = %transport, "payment attempts exhausted");
                Err(PaymentError::Transport(transport.to_string()))
            }
        }
    }

    /// Refunds a previously approved charge.
    #[tracing::instrument(skip(self))]
    pub async fn refund(&self, transaction_id: TransactionId) -> Result<TransactionId> {
        if !self.breaker.can_execute() {
            return Err(PaymentError::CircuitOpen);
        }

        let outcome = self
            .with_retries(|| self.gateway.refund(transaction_id))
            .await;

        match outcome {
            Ok(RefundOutcome::Refunded { refund_id }) => {
                self.breaker.record_success();
                tracing::info!(%transaction_id, %refund_id, "payment refunded");
                Ok(refund_id)
            }
            Ok(RefundOutcome::Rejected { reason }) => {
                self.breaker.record_success();
                Err(PaymentError::RefundRejected {
                    transaction_id,
                    reason,
                })
            }
            Err(transport) => {
                self.breaker.record_failure();
                Err(PaymentError::Transport(transport.to_string()))
            }
        }
    }

    /// Runs one gateway call with per-attempt timeout and backoff on
    /// transport errors.
    async fn with_retries<T, F, Fut>(&self, mut call: F) -> std::result::Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, TransportError>>,
    {
        let policy = self.config.retry;
        let mut delay = policy.base_delay;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.config.request_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(self.config.request_timeout)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(transport) => {
                    metrics::counter!("payment_transport_failures_total").increment(1);
                    if attempt >= policy.max_attempts {
                        return Err(transport);
                    }
                    tracing::warn!(attempt, error = %transport, "payment transport failure, backing off");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(policy.max_delay);
                }
            }
        }
    }
}
