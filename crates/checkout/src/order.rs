//! The order entity written by the checkout orchestrator.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, ReservationId, TransactionId, UserId};
use serde::{Deserialize, Serialize};

use crate::status::OrderStatus;

/// One product line of an order.
///
/// `unit_price` is the catalog price snapshotted at checkout time; a later
/// catalog change never alters what the customer was charged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    /// Set once the engine holds stock for this line.
    pub reservation_id: Option<ReservationId>,
}

impl LineItem {
    /// Price of the whole line.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// An order and its lifecycle state.
///
/// The orchestrator is the single writer; everything else reads snapshots
/// from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub status: OrderStatus,
    pub idempotency_key: String,
    /// Why the checkout failed, for Failed orders.
    pub failure_reason: Option<String>,
    /// Gateway transaction id, once a charge was approved.
    pub payment_id: Option<TransactionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new Pending order.
    pub fn new(user_id: UserId, items: Vec<LineItem>, idempotency_key: String) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            user_id,
            items,
            status: OrderStatus::Pending,
            idempotency_key,
            failure_reason: None,
            payment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Server-derived total from the snapshotted line prices.
    pub fn total(&self) -> Money {
        self.items.iter().map(|item| item.line_total()).sum()
    }

    /// Reservation ids of all lines that hold stock.
    pub fn reservation_ids(&self) -> Vec<ReservationId> {
        self.items
            .iter()
            .filter_map(|item| item.reservation_id)
            .collect()
    }

    /// Records an approved charge and moves the order to Paid.
    pub fn mark_paid(&mut self, transaction_id: TransactionId) {
        self.payment_id = Some(transaction_id);
        self.set_status(OrderStatus::Paid);
    }

    /// Moves the order to Failed with a reason.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.failure_reason = Some(reason.into());
        self.set_status(OrderStatus::Failed);
    }

    /// Moves the order to Canceled.
    pub fn mark_canceled(&mut self) {
        self.set_status(OrderStatus::Canceled);
    }

    pub(crate) fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
