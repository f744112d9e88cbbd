//! Best-effort event publishing.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::event::OrderEvent;

/// Fire-and-forget sink for terminal order events.
///
/// Implementations must never block the checkout path on delivery: `publish`
/// returns once the event is handed off, and delivery failures are logged
/// rather than surfaced to the caller.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: OrderEvent);
}

/// Publisher backed by an in-process channel.
///
/// The receiving half is typically drained by a background task that
/// forwards events to the notification consumer. If the receiver is gone
/// the event is dropped with a warning; the order outcome stands.
#[derive(Clone)]
pub struct ChannelPublisher {
    sender: mpsc::UnboundedSender<OrderEvent>,
}

impl ChannelPublisher {
    /// Creates a publisher and the receiver to drain.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OrderEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventPublisher for ChannelPublisher {
    async fn publish(&self, event: OrderEvent) {
        let event_type = event.event_type();
        let order_id = event.order_id();
        if self.sender.send(event).is_err() {
            tracing::warn!(event_type, %order_id, "event channel closed, dropping event");
        } else {
            tracing::debug!(event_type, %order_id, "event published");
        }
    }
}

/// Test publisher that records every event it receives.
#[derive(Clone, Default)]
pub struct CapturingPublisher {
    events: Arc<Mutex<Vec<OrderEvent>>>,
}

impl CapturingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events published so far.
    pub fn events(&self) -> Vec<OrderEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events of the given type tag.
    pub fn events_of_type(&self, event_type: &str) -> Vec<OrderEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for CapturingPublisher {
    async fn publish(&self, event: OrderEvent) {
        self.events.lock().unwrap().push(event);
    }
}
