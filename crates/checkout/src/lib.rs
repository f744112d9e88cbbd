//! Checkout saga orchestration.
//!
//! The orchestrator owns the order state machine and drives each checkout
//! as a saga: reserve stock line by line, charge the payment, confirm the
//! holds, and publish the terminal outcome. Every forward step has a
//! compensation (release, refund) applied by the caller that observed the
//! failure; payment success is the point of no return.

pub mod catalog;
pub mod error;
pub mod order;
pub mod orchestrator;
pub mod status;
pub mod store;

pub use catalog::{InMemoryCatalog, ProductCatalog, ProductInfo};
pub use error::CheckoutError;
pub use order::{LineItem, Order};
pub use orchestrator::{CheckoutConfig, CheckoutItem, CheckoutOrchestrator, CheckoutRequest};
pub use status::OrderStatus;
pub use store::{InMemoryOrderStore, OrderStore, StoreError};
