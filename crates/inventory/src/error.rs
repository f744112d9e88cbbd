//! Inventory error types.

use common::{ProductId, ReservationId};
use thiserror::Error;

/// Errors returned by the reservation engine.
///
/// All engine operations are local: errors are returned synchronously to
/// the caller and never swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// The product is not registered in the ledger.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// A product with this id is already registered.
    #[error("product already registered: {0}")]
    ProductAlreadyRegistered(ProductId),

    /// Not enough available stock at the instant of the atomic check.
    #[error("insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    /// No reservation exists with the given id.
    #[error("reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    /// The reservation was already released; it cannot be confirmed.
    #[error("reservation {0} was already released")]
    AlreadyReleased(ReservationId),

    /// The reservation was already confirmed; it cannot be released.
    #[error("reservation {0} was already confirmed")]
    AlreadyConfirmed(ReservationId),

    /// A reserve call with zero quantity.
    #[error("cannot reserve zero units of {0}")]
    ZeroQuantity(ProductId),

    /// A restock that would push the available counter past its capacity.
    #[error("stock for {0} would exceed counter capacity")]
    StockOverflow(ProductId),
}

/// Convenience type alias for inventory results.
pub type Result<T> = std::result::Result<T, InventoryError>;
