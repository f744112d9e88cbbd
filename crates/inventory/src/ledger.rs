//! Ledger entities: per-product stock counters and reservation records.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, ReservationId};
use serde::{Deserialize, Serialize};

/// Per-product stock counters.
///
/// Invariant: `available + reserved` equals the total units the ledger has
/// been handed for this product, minus anything consumed by a confirmed
/// reservation. `available` never underflows — a reserve that would take it
/// below zero is rejected at the atomic check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    /// The product these counters belong to.
    pub product_id: ProductId,
    /// Units free to be reserved.
    pub available: u32,
    /// Units held by outstanding reservations.
    pub reserved: u32,
}

impl ProductStock {
    /// Creates counters for a newly registered product.
    pub fn new(product_id: ProductId, available: u32) -> Self {
        Self {
            product_id,
            available,
            reserved: 0,
        }
    }

    /// Units not yet consumed (available or held).
    pub fn on_hand(&self) -> u32 {
        self.available + self.reserved
    }
}

/// The state of a reservation in its lifecycle.
///
/// State transitions:
/// ```text
/// Held ──┬──► Confirmed
///        └──► Released
/// ```
///
/// Both transitions happen exactly once; a terminal reservation never
/// reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReservationState {
    /// Stock is held for an in-flight checkout.
    #[default]
    Held,

    /// Stock was consumed by a paid order (terminal state).
    Confirmed,

    /// Stock was returned to the available pool (terminal state).
    Released,
}

impl ReservationState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationState::Confirmed | ReservationState::Released)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationState::Held => "Held",
            ReservationState::Confirmed => "Confirmed",
            ReservationState::Released => "Released",
        }
    }
}

impl std::fmt::Display for ReservationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A temporary hold on inventory tied to one checkout attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique reservation id.
    pub id: ReservationId,
    /// The product whose stock is held.
    pub product_id: ProductId,
    /// Units held.
    pub quantity: u32,
    /// The order this hold belongs to.
    pub order_reference: OrderId,
    /// Current lifecycle state.
    pub state: ReservationState,
    /// When the hold was taken.
    pub reserved_at: DateTime<Utc>,
    /// When the hold reached a terminal state, if it has.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Creates a new Held reservation.
    pub fn held(product_id: ProductId, quantity: u32, order_reference: OrderId) -> Self {
        Self {
            id: ReservationId::new(),
            product_id,
            quantity,
            order_reference,
            state: ReservationState::Held,
            reserved_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Returns true if the reservation is still holding stock.
    pub fn is_held(&self) -> bool {
        self.state == ReservationState::Held
    }
}
