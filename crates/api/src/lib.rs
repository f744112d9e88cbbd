//! HTTP API server for the checkout service.
//!
//! Exposes the checkout saga over REST with structured logging (tracing).

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use checkout::{CheckoutOrchestrator, InMemoryCatalog, InMemoryOrderStore, ProductInfo};
use common::{Money, ProductId};
use events::{ChannelPublisher, OrderEvent};
use inventory::ReservationEngine;
use payment::{PaymentClient, PaymentClientConfig, SimulatedGateway};
use tokio::sync::mpsc::UnboundedReceiver;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// The orchestrator wired with the in-memory collaborators.
pub type Orchestrator = CheckoutOrchestrator<
    ReservationEngine,
    SimulatedGateway,
    InMemoryCatalog,
    InMemoryOrderStore,
    ChannelPublisher,
>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub engine: ReservationEngine,
    pub catalog: InMemoryCatalog,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/checkout", post(routes::checkout::create))
        .route("/orders", get(routes::orders::list))
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/cancel", post(routes::orders::cancel))
        .route("/reservations/{id}", get(routes::reservations::get))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state and the event stream to drain.
pub fn create_default_state(config: &Config) -> (Arc<AppState>, UnboundedReceiver<OrderEvent>) {
    let engine = ReservationEngine::new();
    let catalog = InMemoryCatalog::new();
    let store = InMemoryOrderStore::new();
    let (publisher, events) = ChannelPublisher::new();

    let gateway = SimulatedGateway::new(config.payment_success_rate);
    let client_config = PaymentClientConfig {
        request_timeout: config.payment_timeout,
        ..PaymentClientConfig::new()
    };
    let client = PaymentClient::new(gateway, client_config);

    let orchestrator =
        CheckoutOrchestrator::new(engine.clone(), client, catalog.clone(), store, publisher);

    let state = Arc::new(AppState {
        orchestrator,
        engine,
        catalog,
    });
    (state, events)
}

/// Seeds a handful of demo products into the catalog and the ledger.
pub async fn seed_demo_products(state: &AppState) {
    let products = [
        ("SKU-KEYBOARD", "Mechanical Keyboard", Money::from_cents(8900), 50),
        ("SKU-MOUSE", "Wireless Mouse", Money::from_cents(3500), 120),
        ("SKU-MONITOR", "27\" Monitor", Money::from_cents(24900), 15),
    ];
    for (sku, name, price, stock) in products {
        let product_id = ProductId::new(sku);
        state
            .catalog
            .upsert(
                product_id.clone(),
                ProductInfo {
                    name: name.to_string(),
                    unit_price: price,
                    active: true,
                },
            )
            .await;
        if let Err(err) = state.engine.register_product(product_id, stock).await {
            tracing::warn!(sku, error = %err, "demo product already registered");
        }
    }
}
