//! Terminal-outcome events published toward the notification channel.
//!
//! Publishing is a notification side effect, not a consistency mechanism:
//! the order's durable state is the source of truth, delivery is best-effort
//! at-least-once, and a publish failure is logged but never rolls anything
//! back.

pub mod event;
pub mod publisher;

pub use event::OrderEvent;
pub use publisher::{CapturingPublisher, ChannelPublisher, EventPublisher};
