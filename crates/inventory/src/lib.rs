//! Inventory reservation ledger and engine.
//!
//! The ledger is the sole owner of per-product stock counters. Every
//! mutation goes through the engine's atomic reserve/confirm/release
//! operations, which serialize access per product — concurrent checkouts
//! against different products proceed independently, while interleaved
//! reserves on the same product are forced through one mutex.
//!
//! A reservation holds stock for exactly one checkout attempt and resolves
//! to Confirmed or Released exactly once. Held reservations that outlive
//! their owner (an orchestrator crash, a stuck saga) are force-released by
//! the stale-reservation sweeper.

pub mod engine;
pub mod error;
pub mod ledger;
pub mod sweeper;

pub use engine::{ReservationEngine, ReservationService, StockLevel};
pub use error::InventoryError;
pub use ledger::{ProductStock, Reservation, ReservationState};
pub use sweeper::SweeperConfig;
