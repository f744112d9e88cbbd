//! Checkout error types.

use common::{OrderId, ProductId};
use thiserror::Error;

use crate::status::OrderStatus;
use crate::store::StoreError;

/// Errors surfaced by the checkout orchestrator.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Request rejected before any side effect.
    #[error("invalid item: {reason}")]
    InvalidItem { reason: String },

    /// A line could not be reserved; earlier holds were released.
    #[error("insufficient stock for {product_id}: {available} available, {requested} requested")]
    StockUnavailable {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    /// The charge was declined or the gateway stayed unreachable.
    #[error("payment failed for order {order_id}: {reason}")]
    PaymentFailed { order_id: OrderId, reason: String },

    /// Cancellation could not refund the captured payment; the order is
    /// left untouched so the cancel can be retried.
    #[error("refund failed for order {order_id}: {reason}")]
    RefundFailed { order_id: OrderId, reason: String },

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("order {order_id} cannot be canceled in {status} state")]
    CancelNotAllowed {
        order_id: OrderId,
        status: OrderStatus,
    },

    #[error("order {order_id} cannot move to {target} from {status}")]
    InvalidTransition {
        order_id: OrderId,
        status: OrderStatus,
        target: OrderStatus,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, CheckoutError>;
