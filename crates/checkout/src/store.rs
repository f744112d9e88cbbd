//! Order persistence seam.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, UserId};
use tokio::sync::RwLock;

use crate::order::Order;

/// Order store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("order {0} already exists")]
    DuplicateOrder(OrderId),

    #[error("an order with idempotency key {0} already exists")]
    DuplicateIdempotencyKey(String),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),
}

/// Durable home of orders, keyed by id and by idempotency key.
///
/// The idempotency key is globally unique, not per user: an anonymous retry
/// arrives with a fresh session identity but the same key, and must still
/// find the original order. `insert` must reject a second order carrying a
/// key already seen; the orchestrator leans on that uniqueness as the
/// backstop against two concurrent checkouts racing past the initial lookup.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: Order) -> Result<(), StoreError>;

    /// Replaces an existing order snapshot.
    async fn update(&self, order: Order) -> Result<(), StoreError>;

    async fn get(&self, order_id: OrderId) -> Option<Order>;

    async fn find_by_idempotency_key(&self, key: &str) -> Option<Order>;

    /// Orders for a user, newest first.
    async fn list_for_user(&self, user_id: UserId) -> Vec<Order>;
}

#[derive(Default)]
struct StoreInner {
    orders: HashMap<OrderId, Order>,
    by_idempotency_key: HashMap<String, OrderId>,
}

/// In-memory order store.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders.
    pub async fn len(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.orders.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.orders.contains_key(&order.id) {
            return Err(StoreError::DuplicateOrder(order.id));
        }
        if inner.by_idempotency_key.contains_key(&order.idempotency_key) {
            return Err(StoreError::DuplicateIdempotencyKey(
                order.idempotency_key.clone(),
            ));
        }
        inner
            .by_idempotency_key
            .insert(order.idempotency_key.clone(), order.id);
        inner.orders.insert(order.id, order);
        Ok(())
    }

    async fn update(&self, order: Order) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.orders.contains_key(&order.id) {
            return Err(StoreError::OrderNotFound(order.id));
        }
        inner.orders.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Option<Order> {
        self.inner.read().await.orders.get(&order_id).cloned()
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Option<Order> {
        let inner = self.inner.read().await;
        let order_id = inner.by_idempotency_key.get(key)?;
        inner.orders.get(order_id).cloned()
    }

    async fn list_for_user(&self, user_id: UserId) -> Vec<Order> {
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }
}
