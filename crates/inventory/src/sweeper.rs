//! Background sweep for stale reservations.
//!
//! Runs as an independent long-running task and talks to the engine only
//! through its public `expire_stale` operation.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::ReservationEngine;

/// Sweep cadence and how long a Held reservation may live.
#[derive(Debug, Clone, Copy)]
pub struct SweeperConfig {
    /// How often the sweep runs.
    pub interval: Duration,
    /// Held reservations older than this are force-released.
    pub reservation_ttl: chrono::Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            reservation_ttl: chrono::Duration::minutes(15),
        }
    }
}

/// Spawns the sweep loop; abort the handle to stop it.
pub fn spawn(engine: ReservationEngine, config: SweeperConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let cutoff = Utc::now() - config.reservation_ttl;
            let released = engine.expire_stale(cutoff).await;
            if !released.is_empty() {
                tracing::info!(count = released.len(), "stale reservation sweep completed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ReservationService;
    use common::{OrderId, ProductId};

    #[tokio::test]
    async fn test_sweeper_releases_expired_holds() {
        let engine = ReservationEngine::new();
        let sku = ProductId::new("SKU-001");
        engine.register_product(sku.clone(), 5).await.unwrap();
        engine.reserve(&sku, 5, OrderId::new()).await.unwrap();

        // TTL of zero: everything Held is stale on the first tick.
        let handle = spawn(
            engine.clone(),
            SweeperConfig {
                interval: Duration::from_millis(10),
                reservation_ttl: chrono::Duration::zero(),
            },
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        let level = engine.stock(&sku).await.unwrap();
        assert_eq!(level.available, 5);
        assert_eq!(engine.held_count().await, 0);
    }
}
