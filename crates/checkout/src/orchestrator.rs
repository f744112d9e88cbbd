//! The checkout saga orchestrator.
//!
//! One checkout is one task driving a strictly sequential chain: idempotency
//! lookup, item validation, per-line reservation, payment, confirmation.
//! Compensation is caller-driven: whoever observed the failure releases the
//! holds it accumulated. Payment success is the durable decision point —
//! after an approved charge the order is Paid no matter what the inventory
//! engine does next.

use std::time::{Duration, Instant};

use common::{OrderId, ProductId, ReservationId, UserId};
use events::{EventPublisher, OrderEvent};
use inventory::{InventoryError, ReservationService};
use payment::{PaymentClient, PaymentError, PaymentGateway};
use serde::{Deserialize, Serialize};

use crate::catalog::ProductCatalog;
use crate::error::{CheckoutError, Result};
use crate::order::{LineItem, Order};
use crate::status::OrderStatus;
use crate::store::{OrderStore, StoreError};

/// One requested product line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A checkout submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    pub items: Vec<CheckoutItem>,
    /// Client-chosen key making the checkout at-most-once per user.
    pub idempotency_key: String,
}

/// Retry settings for post-payment reservation confirmation.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutConfig {
    /// Synchronous confirm attempts before handing off to the background.
    pub confirm_attempts: u32,
    pub confirm_retry_delay: Duration,
    /// Initial delay of the detached retry task; doubles up to the cap.
    pub background_confirm_delay: Duration,
    pub background_confirm_max_delay: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            confirm_attempts: 3,
            confirm_retry_delay: Duration::from_millis(100),
            background_confirm_delay: Duration::from_secs(5),
            background_confirm_max_delay: Duration::from_secs(60),
        }
    }
}

/// Drives the checkout saga over the reservation engine, payment client,
/// catalog, order store, and event publisher.
pub struct CheckoutOrchestrator<R, G, C, S, E> {
    reservations: R,
    payments: PaymentClient<G>,
    catalog: C,
    orders: S,
    publisher: E,
    config: CheckoutConfig,
}

impl<R, G, C, S, E> CheckoutOrchestrator<R, G, C, S, E>
where
    R: ReservationService + Clone + 'static,
    G: PaymentGateway,
    C: ProductCatalog,
    S: OrderStore,
    E: EventPublisher,
{
    /// Creates an orchestrator with default confirm-retry settings.
    pub fn new(
        reservations: R,
        payments: PaymentClient<G>,
        catalog: C,
        orders: S,
        publisher: E,
    ) -> Self {
        Self::with_config(
            reservations,
            payments,
            catalog,
            orders,
            publisher,
            CheckoutConfig::default(),
        )
    }

    pub fn with_config(
        reservations: R,
        payments: PaymentClient<G>,
        catalog: C,
        orders: S,
        publisher: E,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            reservations,
            payments,
            catalog,
            orders,
            publisher,
            config,
        }
    }

    /// Runs a full checkout saga.
    ///
    /// A repeated idempotency key returns the stored order without
    /// re-executing any step. Validation happens before any side effect;
    /// a reservation failure releases earlier holds and records the order
    /// as Failed; a payment failure releases every hold.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<Order> {
        metrics::counter!("checkouts_started_total").increment(1);
        let started = Instant::now();

        if let Some(existing) = self
            .orders
            .find_by_idempotency_key(&request.idempotency_key)
            .await
        {
            tracing::info!(
                order_id = %existing.id,
                idempotency_key = %request.idempotency_key,
                "repeated idempotency key, returning stored order"
            );
            return Ok(existing);
        }

        let items = self.validate_items(&request).await?;
        let mut order = Order::new(request.user_id, items, request.idempotency_key);

        if let Err(err) = self.reserve_lines(&mut order).await {
            order.mark_failed(err.to_string());
            self.persist_failed(order).await?;
            metrics::counter!("checkouts_failed_total", "stage" => "reserve").increment(1);
            return Err(err);
        }

        // A concurrent checkout with the same key may have won the insert
        // race; in that case undo the holds and return the winner's order.
        match self.orders.insert(order.clone()).await {
            Ok(()) => {}
            Err(StoreError::DuplicateIdempotencyKey(key)) => {
                tracing::info!(idempotency_key = %key, "lost idempotency insert race");
                self.release_all(&order).await;
                return self
                    .orders
                    .find_by_idempotency_key(&key)
                    .await
                    .ok_or(CheckoutError::Store(StoreError::DuplicateIdempotencyKey(
                        key,
                    )));
            }
            Err(err) => {
                self.release_all(&order).await;
                return Err(err.into());
            }
        }

        let total = order.total();
        match self.payments.charge(order.id, order.user_id, total).await {
            Ok(transaction_id) => {
                self.confirm_reservations(&order).await;
                order.mark_paid(transaction_id);
                self.orders.update(order.clone()).await?;
                self.publisher
                    .publish(OrderEvent::OrderCreated {
                        order_id: order.id,
                        user_id: order.user_id,
                        total,
                        transaction_id,
                    })
                    .await;
                metrics::counter!("checkouts_completed_total").increment(1);
                metrics::histogram!("checkout_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(order_id = %order.id, %total, "checkout completed");
                Ok(order)
            }
            Err(err) => {
                self.release_all(&order).await;
                let reason = err.to_string();
                order.mark_failed(reason.clone());
                self.orders.update(order.clone()).await?;
                self.publisher
                    .publish(OrderEvent::PaymentFailed {
                        order_id: order.id,
                        user_id: order.user_id,
                        reason: reason.clone(),
                    })
                    .await;
                metrics::counter!("checkouts_failed_total", "stage" => "payment").increment(1);
                tracing::warn!(order_id = %order.id, reason, "checkout failed at payment");
                Err(CheckoutError::PaymentFailed {
                    order_id: order.id,
                    reason,
                })
            }
        }
    }

    /// Cancels an order that has not shipped.
    ///
    /// Refunds the captured payment if there is one, releases any lines
    /// still holding stock, and marks the order Canceled. A transport-level
    /// refund failure leaves the order untouched so the cancel can be
    /// retried; a definitive refund rejection (already refunded, unknown
    /// transaction) does not block the cancellation.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, order_id: OrderId) -> Result<Order> {
        let mut order = self
            .orders
            .get(order_id)
            .await
            .ok_or(CheckoutError::OrderNotFound(order_id))?;

        if !order.status.can_cancel() {
            return Err(CheckoutError::CancelNotAllowed {
                order_id,
                status: order.status,
            });
        }

        let mut refunded = false;
        if let Some(transaction_id) = order.payment_id {
            match self.payments.refund(transaction_id).await {
                Ok(refund_id) => {
                    refunded = true;
                    tracing::info!(%order_id, %refund_id, "payment refunded for cancellation");
                }
                Err(PaymentError::RefundRejected { reason, .. }) => {
                    tracing::warn!(%order_id, reason, "refund rejected, canceling anyway");
                }
                Err(err) => {
                    return Err(CheckoutError::RefundFailed {
                        order_id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        for reservation_id in order.reservation_ids() {
            match self.reservations.release(reservation_id).await {
                Ok(()) => {}
                // Confirmed lines consumed their stock; nothing to return.
                Err(InventoryError::AlreadyConfirmed(_)) => {}
                Err(err) => {
                    tracing::warn!(%order_id, %reservation_id, error = %err, "release during cancel failed");
                }
            }
        }

        order.mark_canceled();
        self.orders.update(order.clone()).await?;
        self.publisher
            .publish(OrderEvent::OrderCanceled {
                order_id,
                user_id: order.user_id,
                refunded,
            })
            .await;
        metrics::counter!("orders_canceled_total").increment(1);
        Ok(order)
    }

    /// Looks up an order by id.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .get(order_id)
            .await
            .ok_or(CheckoutError::OrderNotFound(order_id))
    }

    /// Orders for a user, newest first.
    pub async fn list_orders(&self, user_id: UserId) -> Vec<Order> {
        self.orders.list_for_user(user_id).await
    }

    /// Moves a Paid order into fulfilment.
    pub async fn mark_processing(&self, order_id: OrderId) -> Result<Order> {
        self.transition(order_id, OrderStatus::Processing, OrderStatus::can_start_processing)
            .await
    }

    /// Marks a Processing order as handed to the carrier.
    pub async fn mark_shipped(&self, order_id: OrderId) -> Result<Order> {
        self.transition(order_id, OrderStatus::Shipped, OrderStatus::can_ship)
            .await
    }

    /// Marks a Shipped order as delivered.
    pub async fn mark_delivered(&self, order_id: OrderId) -> Result<Order> {
        self.transition(order_id, OrderStatus::Delivered, OrderStatus::can_deliver)
            .await
    }

    async fn transition(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        guard: fn(&OrderStatus) -> bool,
    ) -> Result<Order> {
        let mut order = self
            .orders
            .get(order_id)
            .await
            .ok_or(CheckoutError::OrderNotFound(order_id))?;

        if !guard(&order.status) {
            return Err(CheckoutError::InvalidTransition {
                order_id,
                status: order.status,
                target,
            });
        }

        order.set_status(target);
        self.orders.update(order.clone()).await?;
        tracing::info!(%order_id, status = %target, "order status advanced");
        Ok(order)
    }

    /// Validates the request and snapshots catalog prices. No side effects.
    async fn validate_items(&self, request: &CheckoutRequest) -> Result<Vec<LineItem>> {
        if request.items.is_empty() {
            return Err(CheckoutError::InvalidItem {
                reason: "order has no items".into(),
            });
        }

        let mut lines = Vec::with_capacity(request.items.len());
        for item in &request.items {
            if item.quantity == 0 {
                return Err(CheckoutError::InvalidItem {
                    reason: format!("quantity for {} must be positive", item.product_id),
                });
            }
            let info = self.catalog.product(&item.product_id).await.ok_or_else(|| {
                CheckoutError::InvalidItem {
                    reason: format!("unknown product {}", item.product_id),
                }
            })?;
            if !info.active {
                return Err(CheckoutError::InvalidItem {
                    reason: format!("product {} is not available for sale", item.product_id),
                });
            }
            lines.push(LineItem {
                product_id: item.product_id.clone(),
                product_name: info.name,
                quantity: item.quantity,
                unit_price: info.unit_price,
                reservation_id: None,
            });
        }
        Ok(lines)
    }

    /// Reserves each line in submitted order. On the first failure releases
    /// the earlier holds, also in order, and surfaces the failing line.
    async fn reserve_lines(&self, order: &mut Order) -> Result<()> {
        for index in 0..order.items.len() {
            let (product_id, quantity) = {
                let item = &order.items[index];
                (item.product_id.clone(), item.quantity)
            };
            match self.reservations.reserve(&product_id, quantity, order.id).await {
                Ok(reservation_id) => {
                    order.items[index].reservation_id = Some(reservation_id);
                }
                Err(err) => {
                    tracing::warn!(
                        order_id = %order.id,
                        %product_id,
                        error = %err,
                        "reservation failed, releasing earlier holds"
                    );
                    self.release_all(order).await;
                    for item in &mut order.items {
                        item.reservation_id = None;
                    }
                    return Err(match err {
                        InventoryError::InsufficientStock {
                            product_id,
                            available,
                            requested,
                        } => CheckoutError::StockUnavailable {
                            product_id,
                            available,
                            requested,
                        },
                        other => CheckoutError::InvalidItem {
                            reason: other.to_string(),
                        },
                    });
                }
            }
        }
        Ok(())
    }

    /// Releases every hold the order carries, logging rather than failing.
    async fn release_all(&self, order: &Order) {
        for reservation_id in order.reservation_ids() {
            if let Err(err) = self.reservations.release(reservation_id).await {
                tracing::warn!(
                    order_id = %order.id,
                    %reservation_id,
                    error = %err,
                    "failed to release reservation"
                );
            }
        }
    }

    /// Confirms every hold after an approved charge.
    ///
    /// Each reservation gets a few synchronous attempts; whatever is still
    /// unconfirmed is handed to a detached retry task. The caller proceeds
    /// to mark the order Paid either way.
    async fn confirm_reservations(&self, order: &Order) {
        let mut unconfirmed = Vec::new();
        for reservation_id in order.reservation_ids() {
            if !self.try_confirm(reservation_id).await {
                unconfirmed.push(reservation_id);
            }
        }

        if !unconfirmed.is_empty() {
            self.spawn_confirm_retry(order.id, unconfirmed);
        }
    }

    async fn try_confirm(&self, reservation_id: ReservationId) -> bool {
        for attempt in 1..=self.config.confirm_attempts {
            match self.reservations.confirm(reservation_id).await {
                Ok(()) => return true,
                Err(err) => {
                    tracing::warn!(%reservation_id, attempt, error = %err, "confirm attempt failed");
                    if attempt < self.config.confirm_attempts {
                        tokio::time::sleep(self.config.confirm_retry_delay).await;
                    }
                }
            }
        }
        false
    }

    /// The money has moved, so confirmation is retried until it succeeds;
    /// the only stop is a definitive terminal conflict (the sweep released
    /// the hold in the meantime), which is escalated for reconciliation.
    fn spawn_confirm_retry(&self, order_id: OrderId, pending: Vec<ReservationId>) {
        let reservations = self.reservations.clone();
        let base_delay = self.config.background_confirm_delay;
        let max_delay = self.config.background_confirm_max_delay;
        tokio::spawn(async move {
            for reservation_id in pending {
                let mut delay = base_delay;
                let mut failures: u64 = 0;
                loop {
                    tokio::time::sleep(delay).await;
                    match reservations.confirm(reservation_id).await {
                        Ok(()) => {
                            tracing::info!(%order_id, %reservation_id, "deferred confirm succeeded");
                            break;
                        }
                        Err(err @ InventoryError::AlreadyReleased(_)) => {
                            metrics::counter!("reservation_confirms_lost_total").increment(1);
                            tracing::error!(
                                %order_id,
                                %reservation_id,
                                error = %err,
                                "paid order lost its hold, manual reconciliation required"
                            );
                            break;
                        }
                        Err(err) => {
                            failures += 1;
                            if failures % 10 == 0 {
                                tracing::error!(
                                    %order_id,
                                    %reservation_id,
                                    failures,
                                    error = %err,
                                    "reservation still unconfirmed after payment"
                                );
                            } else {
                                tracing::warn!(%order_id, %reservation_id, error = %err, "deferred confirm failed");
                            }
                            delay = (delay * 2).min(max_delay);
                        }
                    }
                }
            }
        });
    }

    /// Persists a checkout that failed before an order existed in the store.
    async fn persist_failed(&self, order: Order) -> Result<()> {
        match self.orders.insert(order).await {
            Ok(()) => Ok(()),
            // Lost the idempotency race to a concurrent checkout; its order
            // is the one of record.
            Err(StoreError::DuplicateIdempotencyKey(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
