//! Payment gateway client.
//!
//! The gateway is an external collaborator: each charge attempt gets one
//! authoritative Approved/Declined answer, which is final and never retried.
//! Only transport-level failures (timeouts, connection errors) are retried,
//! with exponential backoff and a circuit breaker so a dead gateway fails
//! fast instead of holding reservations hostage.

pub mod breaker;
pub mod client;
pub mod error;
pub mod gateway;

pub use breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use client::{PaymentClient, PaymentClientConfig, RetryPolicy};
pub use error::PaymentError;
pub use gateway::{ChargeOutcome, PaymentGateway, RefundOutcome, SimulatedGateway, TransportError};
