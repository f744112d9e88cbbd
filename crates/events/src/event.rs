//! Event payloads for terminal checkout outcomes.

use common::{Money, OrderId, TransactionId, UserId};
use serde::{Deserialize, Serialize};

/// A terminal outcome of a checkout or cancellation.
///
/// Serializes with an `event_type` tag so the downstream notification
/// consumer can dispatch on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum OrderEvent {
    /// The checkout completed: stock confirmed, payment captured.
    OrderCreated {
        order_id: OrderId,
        user_id: UserId,
        total: Money,
        transaction_id: TransactionId,
    },

    /// The payment step failed; reservations were released.
    PaymentFailed {
        order_id: OrderId,
        user_id: UserId,
        reason: String,
    },

    /// The order was canceled after checkout.
    OrderCanceled {
        order_id: OrderId,
        user_id: UserId,
        refunded: bool,
    },
}

impl OrderEvent {
    /// Returns the event type tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated { .. } => "order_created",
            OrderEvent::PaymentFailed { .. } => "payment_failed",
            OrderEvent::OrderCanceled { .. } => "order_canceled",
        }
    }

    /// The order this event is about.
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::OrderCreated { order_id, .. }
            | OrderEvent::PaymentFailed { order_id, .. }
            | OrderEvent::OrderCanceled { order_id, .. } => *order_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_tags() {
        let created = OrderEvent::OrderCreated {
            order_id: OrderId::new(),
            user_id: UserId::new(),
            total: Money::from_cents(1000),
            transaction_id: TransactionId::new(),
        };
        assert_eq!(created.event_type(), "order_created");

        let failed = OrderEvent::PaymentFailed {
            order_id: OrderId::new(),
            user_id: UserId::new(),
            reason: "declined".into(),
        };
        assert_eq!(failed.event_type(), "payment_failed");
    }

    #[test]
    fn test_serialized_payload_carries_tag_and_order_id() {
        let order_id = OrderId::new();
        let event = OrderEvent::PaymentFailed {
            order_id,
            user_id: UserId::new(),
            reason: "declined by bank".into(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "payment_failed");
        assert_eq!(json["order_id"], order_id.to_string());
        assert_eq!(json["reason"], "declined by bank");
    }

    #[test]
    fn test_serialization_roundtrip() {
        let event = OrderEvent::OrderCanceled {
            order_id: OrderId::new(),
            user_id: UserId::new(),
            refunded: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        let deserialized: OrderEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, deserialized);
    }
}
