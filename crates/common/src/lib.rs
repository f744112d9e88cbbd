//! Shared types used across the checkout services.
//!
//! Identifier newtypes prevent mixing up the various UUID- and string-based
//! ids that flow between the orchestrator, the reservation engine, and the
//! payment client. `Money` keeps amounts in integer cents.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{OrderId, ProductId, ReservationId, TransactionId, UserId};
