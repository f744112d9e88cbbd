//! Reservation engine: atomic reserve/confirm/release over the ledger.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, ReservationId};
use tokio::sync::{Mutex, RwLock};

use crate::error::{InventoryError, Result};
use crate::ledger::{ProductStock, Reservation, ReservationState};

/// Read-only snapshot of a product's stock counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevel {
    pub available: u32,
    pub reserved: u32,
}

/// Reservation operations exposed to the checkout orchestrator.
///
/// The engine is the only implementation in production; tests wrap it to
/// inject transport faults on individual calls.
#[async_trait]
pub trait ReservationService: Send + Sync {
    /// Atomically holds `quantity` units of a product for an order.
    async fn reserve(
        &self,
        product_id: &ProductId,
        quantity: u32,
        order_reference: OrderId,
    ) -> Result<ReservationId>;

    /// Moves a held reservation to Confirmed, consuming the stock.
    ///
    /// Confirming an already-Confirmed reservation is a no-op success so
    /// retries are safe.
    async fn confirm(&self, reservation_id: ReservationId) -> Result<()>;

    /// Moves a held reservation to Released, returning stock to the pool.
    ///
    /// Releasing an already-Released reservation is a no-op success.
    async fn release(&self, reservation_id: ReservationId) -> Result<()>;
}

/// The reservation engine: sole owner of per-product stock counters.
///
/// Each product's counters sit behind their own mutex, so the atomic
/// compare-and-decrement serializes per product, not globally. Reservation
/// records live in a separate map whose lock is never held across a product
/// lock: a resolution flips the record to its terminal state under the
/// record lock, then adjusts the counters under the product lock alone. The
/// state flip happens exactly once per reservation, so the counter
/// adjustment cannot double-apply, and resolutions on different products
/// never wait on each other.
#[derive(Clone, Default)]
pub struct ReservationEngine {
    products: Arc<RwLock<HashMap<ProductId, Arc<Mutex<ProductStock>>>>>,
    reservations: Arc<Mutex<HashMap<ReservationId, Reservation>>>,
}

impl ReservationEngine {
    /// Creates an empty engine with no registered products.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a product with an initial available quantity.
    pub async fn register_product(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        let mut products = self.products.write().await;
        if products.contains_key(&product_id) {
            return Err(InventoryError::ProductAlreadyRegistered(product_id));
        }
        products.insert(
            product_id.clone(),
            Arc::new(Mutex::new(ProductStock::new(product_id, quantity))),
        );
        Ok(())
    }

    /// Adds units to a product's available pool (restock).
    pub async fn add_stock(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let stock = self.stock_handle(product_id).await?;
        let mut stock = stock.lock().await;
        stock.available = stock
            .available
            .checked_add(quantity)
            .ok_or_else(|| InventoryError::StockOverflow(product_id.clone()))?;
        Ok(())
    }

    /// Returns the current counters for a product.
    pub async fn stock(&self, product_id: &ProductId) -> Result<StockLevel> {
        let stock = self.stock_handle(product_id).await?;
        let stock = stock.lock().await;
        Ok(StockLevel {
            available: stock.available,
            reserved: stock.reserved,
        })
    }

    /// Returns a copy of a reservation record, if it exists.
    pub async fn reservation(&self, reservation_id: ReservationId) -> Option<Reservation> {
        self.reservations.lock().await.get(&reservation_id).cloned()
    }

    /// Returns the number of reservations currently in Held state.
    pub async fn held_count(&self) -> usize {
        self.reservations
            .lock()
            .await
            .values()
            .filter(|r| r.is_held())
            .count()
    }

    /// Force-releases every Held reservation taken at or before `cutoff`.
    ///
    /// Protects against orchestrator crashes leaving stock locked forever.
    /// Returns the ids that were released.
    #[tracing::instrument(skip(self))]
    pub async fn expire_stale(&self, cutoff: DateTime<Utc>) -> Vec<ReservationId> {
        // Flip the stale records in one pass under the record lock, then
        // return their stock without it, so an in-flight confirm on an
        // unrelated product is never held up by the sweep.
        let stale: Vec<(ReservationId, OrderId, ProductId, u32)> = {
            let mut reservations = self.reservations.lock().await;
            reservations
                .values_mut()
                .filter(|r| r.is_held() && r.reserved_at <= cutoff)
                .map(|r| {
                    r.state = ReservationState::Released;
                    r.resolved_at = Some(Utc::now());
                    (r.id, r.order_reference, r.product_id.clone(), r.quantity)
                })
                .collect()
        };

        let mut released = Vec::with_capacity(stale.len());
        for (id, order_id, product_id, quantity) in stale {
            let Ok(stock_handle) = self.stock_handle(&product_id).await else {
                continue;
            };
            {
                let mut stock = stock_handle.lock().await;
                stock.reserved -= quantity;
                stock.available += quantity;
            }

            metrics::counter!("stale_reservations_released_total").increment(1);
            tracing::warn!(
                reservation_id = %id,
                %order_id,
                %product_id,
                quantity,
                "force-released stale reservation"
            );
            released.push(id);
        }
        released
    }

    async fn stock_handle(&self, product_id: &ProductId) -> Result<Arc<Mutex<ProductStock>>> {
        let products = self.products.read().await;
        products
            .get(product_id)
            .cloned()
            .ok_or_else(|| InventoryError::ProductNotFound(product_id.clone()))
    }

    /// Resolves a Held reservation to the given terminal state, adjusting
    /// the product counters accordingly.
    ///
    /// The state flip is the linearization point: it happens under the
    /// record lock, and the counters are adjusted afterwards under the
    /// product lock only, so a slow resolution on one product cannot stall
    /// resolutions on another.
    async fn resolve(&self, reservation_id: ReservationId, target: ReservationState) -> Result<()> {
        let (product_id, quantity) = {
            let mut reservations = self.reservations.lock().await;
            let reservation = reservations
                .get_mut(&reservation_id)
                .ok_or(InventoryError::ReservationNotFound(reservation_id))?;

            match (reservation.state, target) {
                // Idempotent retry: already in the requested terminal state.
                (ReservationState::Confirmed, ReservationState::Confirmed)
                | (ReservationState::Released, ReservationState::Released) => return Ok(()),
                (ReservationState::Released, ReservationState::Confirmed) => {
                    return Err(InventoryError::AlreadyReleased(reservation_id));
                }
                (ReservationState::Confirmed, ReservationState::Released) => {
                    return Err(InventoryError::AlreadyConfirmed(reservation_id));
                }
                (ReservationState::Held, _) => {}
                // `target` is always terminal; Held is never requested.
                (_, ReservationState::Held) => unreachable!("Held is not a resolution target"),
            }

            reservation.state = target;
            reservation.resolved_at = Some(Utc::now());
            (reservation.product_id.clone(), reservation.quantity)
        };

        // Only the Held -> terminal winner reaches this point; every retry
        // returns above, so the adjustment applies exactly once.
        let stock_handle = self.stock_handle(&product_id).await?;
        let mut stock = stock_handle.lock().await;
        stock.reserved -= quantity;
        if target == ReservationState::Released {
            stock.available += quantity;
        }
        Ok(())
    }
}

#[async_trait]
impl ReservationService for ReservationEngine {
    #[tracing::instrument(skip(self), fields(product_id = %product_id))]
    async fn reserve(
        &self,
        product_id: &ProductId,
        quantity: u32,
        order_reference: OrderId,
    ) -> Result<ReservationId> {
        if quantity == 0 {
            return Err(InventoryError::ZeroQuantity(product_id.clone()));
        }

        let stock_handle = self.stock_handle(product_id).await?;
        {
            let mut stock = stock_handle.lock().await;
            if stock.available < quantity {
                metrics::counter!("reservations_rejected_total").increment(1);
                return Err(InventoryError::InsufficientStock {
                    product_id: product_id.clone(),
                    available: stock.available,
                    requested: quantity,
                });
            }
            stock.available -= quantity;
            stock.reserved += quantity;
        }

        let reservation = Reservation::held(product_id.clone(), quantity, order_reference);
        let reservation_id = reservation.id;
        self.reservations
            .lock()
            .await
            .insert(reservation_id, reservation);

        metrics::counter!("stock_reserved_total").increment(u64::from(quantity));
        tracing::debug!(%reservation_id, quantity, "stock reserved");
        Ok(reservation_id)
    }

    #[tracing::instrument(skip(self))]
    async fn confirm(&self, reservation_id: ReservationId) -> Result<()> {
        self.resolve(reservation_id, ReservationState::Confirmed)
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn release(&self, reservation_id: ReservationId) -> Result<()> {
        self.resolve(reservation_id, ReservationState::Released)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn engine_with(product: &str, quantity: u32) -> ReservationEngine {
        let engine = ReservationEngine::new();
        engine
            .register_product(ProductId::new(product), quantity)
            .await
            .unwrap();
        engine
    }

    #[tokio::test]
    async fn test_reserve_moves_available_to_reserved() {
        let engine = engine_with("SKU-001", 10).await;
        let sku = ProductId::new("SKU-001");

        let id = engine.reserve(&sku, 3, OrderId::new()).await.unwrap();

        let level = engine.stock(&sku).await.unwrap();
        assert_eq!(level.available, 7);
        assert_eq!(level.reserved, 3);

        let res = engine.reservation(id).await.unwrap();
        assert_eq!(res.state, ReservationState::Held);
        assert_eq!(res.quantity, 3);
    }

    #[tokio::test]
    async fn test_reserve_insufficient_stock() {
        let engine = engine_with("SKU-001", 2).await;
        let sku = ProductId::new("SKU-001");

        let err = engine.reserve(&sku, 3, OrderId::new()).await.unwrap_err();
        assert_eq!(
            err,
            InventoryError::InsufficientStock {
                product_id: sku.clone(),
                available: 2,
                requested: 3,
            }
        );

        // Nothing was decremented.
        let level = engine.stock(&sku).await.unwrap();
        assert_eq!(level.available, 2);
        assert_eq!(level.reserved, 0);
    }

    #[tokio::test]
    async fn test_reserve_unknown_product() {
        let engine = ReservationEngine::new();
        let err = engine
            .reserve(&ProductId::new("NOPE"), 1, OrderId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn test_reserve_zero_quantity() {
        let engine = engine_with("SKU-001", 5).await;
        let err = engine
            .reserve(&ProductId::new("SKU-001"), 0, OrderId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::ZeroQuantity(_)));
    }

    #[tokio::test]
    async fn test_confirm_consumes_reserved_stock() {
        let engine = engine_with("SKU-001", 10).await;
        let sku = ProductId::new("SKU-001");

        let id = engine.reserve(&sku, 4, OrderId::new()).await.unwrap();
        engine.confirm(id).await.unwrap();

        let level = engine.stock(&sku).await.unwrap();
        assert_eq!(level.available, 6);
        assert_eq!(level.reserved, 0);

        let res = engine.reservation(id).await.unwrap();
        assert_eq!(res.state, ReservationState::Confirmed);
        assert!(res.resolved_at.is_some());
    }

    #[tokio::test]
    async fn test_release_returns_stock_to_available() {
        let engine = engine_with("SKU-001", 10).await;
        let sku = ProductId::new("SKU-001");

        let id = engine.reserve(&sku, 4, OrderId::new()).await.unwrap();
        engine.release(id).await.unwrap();

        let level = engine.stock(&sku).await.unwrap();
        assert_eq!(level.available, 10);
        assert_eq!(level.reserved, 0);
    }

    #[tokio::test]
    async fn test_confirm_is_idempotent() {
        let engine = engine_with("SKU-001", 10).await;
        let sku = ProductId::new("SKU-001");

        let id = engine.reserve(&sku, 4, OrderId::new()).await.unwrap();
        engine.confirm(id).await.unwrap();
        engine.confirm(id).await.unwrap();

        // No double-counting of stock.
        let level = engine.stock(&sku).await.unwrap();
        assert_eq!(level.available, 6);
        assert_eq!(level.reserved, 0);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let engine = engine_with("SKU-001", 10).await;
        let sku = ProductId::new("SKU-001");

        let id = engine.reserve(&sku, 4, OrderId::new()).await.unwrap();
        engine.release(id).await.unwrap();
        engine.release(id).await.unwrap();

        let level = engine.stock(&sku).await.unwrap();
        assert_eq!(level.available, 10);
        assert_eq!(level.reserved, 0);
    }

    #[tokio::test]
    async fn test_confirm_after_release_is_rejected() {
        let engine = engine_with("SKU-001", 10).await;
        let id = engine
            .reserve(&ProductId::new("SKU-001"), 1, OrderId::new())
            .await
            .unwrap();
        engine.release(id).await.unwrap();

        let err = engine.confirm(id).await.unwrap_err();
        assert_eq!(err, InventoryError::AlreadyReleased(id));
    }

    #[tokio::test]
    async fn test_release_after_confirm_is_rejected() {
        let engine = engine_with("SKU-001", 10).await;
        let id = engine
            .reserve(&ProductId::new("SKU-001"), 1, OrderId::new())
            .await
            .unwrap();
        engine.confirm(id).await.unwrap();

        let err = engine.release(id).await.unwrap_err();
        assert_eq!(err, InventoryError::AlreadyConfirmed(id));
    }

    #[tokio::test]
    async fn test_confirm_unknown_reservation() {
        let engine = ReservationEngine::new();
        let err = engine.confirm(ReservationId::new()).await.unwrap_err();
        assert!(matches!(err, InventoryError::ReservationNotFound(_)));
    }

    #[tokio::test]
    async fn test_register_duplicate_product() {
        let engine = engine_with("SKU-001", 5).await;
        let err = engine
            .register_product(ProductId::new("SKU-001"), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::ProductAlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn test_add_stock() {
        let engine = engine_with("SKU-001", 5).await;
        let sku = ProductId::new("SKU-001");

        engine.add_stock(&sku, 7).await.unwrap();
        let level = engine.stock(&sku).await.unwrap();
        assert_eq!(level.available, 12);
    }

    #[tokio::test]
    async fn test_add_stock_overflow_is_rejected() {
        let engine = engine_with("SKU-001", u32::MAX - 1).await;
        let sku = ProductId::new("SKU-001");

        let err = engine.add_stock(&sku, 2).await.unwrap_err();
        assert_eq!(err, InventoryError::StockOverflow(sku.clone()));

        // The counter is untouched.
        let level = engine.stock(&sku).await.unwrap();
        assert_eq!(level.available, u32::MAX - 1);
    }

    #[tokio::test]
    async fn test_resolutions_on_distinct_products_do_not_serialize() {
        let engine = ReservationEngine::new();
        let sku_a = ProductId::new("SKU-A");
        let sku_b = ProductId::new("SKU-B");
        engine.register_product(sku_a.clone(), 5).await.unwrap();
        engine.register_product(sku_b.clone(), 5).await.unwrap();
        let a = engine.reserve(&sku_a, 1, OrderId::new()).await.unwrap();
        let b = engine.reserve(&sku_b, 1, OrderId::new()).await.unwrap();

        // Pin product A's counter lock, standing in for a slow resolution.
        let a_handle = engine.products.read().await.get(&sku_a).cloned().unwrap();
        let a_guard = a_handle.lock().await;

        let stuck = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.confirm(a).await })
        };
        // Let the spawned confirm run up to the held product lock.
        tokio::task::yield_now().await;

        // Product B's resolution must complete while A's is stuck.
        tokio::time::timeout(std::time::Duration::from_secs(1), engine.confirm(b))
            .await
            .expect("confirm on an unrelated product must not wait")
            .unwrap();

        drop(a_guard);
        stuck.await.unwrap().unwrap();
        let level = engine.stock(&sku_a).await.unwrap();
        assert_eq!(level.reserved, 0);
    }

    #[tokio::test]
    async fn test_expire_stale_releases_old_holds() {
        let engine = engine_with("SKU-001", 10).await;
        let sku = ProductId::new("SKU-001");

        let stale = engine.reserve(&sku, 3, OrderId::new()).await.unwrap();
        engine.reserve(&sku, 2, OrderId::new()).await.unwrap();

        // Backdate the first reservation past the cutoff.
        {
            let mut reservations = engine.reservations.lock().await;
            reservations.get_mut(&stale).unwrap().reserved_at =
                Utc::now() - chrono::Duration::minutes(30);
        }

        let released = engine
            .expire_stale(Utc::now() - chrono::Duration::minutes(10))
            .await;
        assert_eq!(released, vec![stale]);

        let level = engine.stock(&sku).await.unwrap();
        assert_eq!(level.available, 8);
        assert_eq!(level.reserved, 2);
        assert_eq!(engine.held_count().await, 1);
    }

    #[tokio::test]
    async fn test_expire_stale_ignores_resolved() {
        let engine = engine_with("SKU-001", 10).await;
        let sku = ProductId::new("SKU-001");

        let id = engine.reserve(&sku, 3, OrderId::new()).await.unwrap();
        engine.confirm(id).await.unwrap();

        // Even with a future cutoff, terminal reservations are untouched.
        let released = engine.expire_stale(Utc::now()).await;
        assert!(released.is_empty());

        let level = engine.stock(&sku).await.unwrap();
        assert_eq!(level.available, 7);
    }
}
