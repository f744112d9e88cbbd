//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use checkout::{CheckoutItem, CheckoutRequest};
use common::{ProductId, UserId};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::orders::OrderResponse;
use crate::routes::parse_uuid;

#[derive(Deserialize)]
pub struct CheckoutBody {
    /// Generated when absent, for anonymous checkouts in demos.
    pub user_id: Option<String>,
    pub items: Vec<CheckoutItemBody>,
    pub idempotency_key: String,
}

#[derive(Deserialize)]
pub struct CheckoutItemBody {
    pub product_id: String,
    pub quantity: u32,
}

/// POST /checkout — run the checkout saga for a cart.
#[tracing::instrument(skip(state, body))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let user_id = match body.user_id.as_deref() {
        Some(id) => UserId::from_uuid(parse_uuid(id)?),
        None => UserId::new(),
    };

    let request = CheckoutRequest {
        user_id,
        items: body
            .items
            .into_iter()
            .map(|item| CheckoutItem {
                product_id: ProductId::new(item.product_id),
                quantity: item.quantity,
            })
            .collect(),
        idempotency_key: body.idempotency_key,
    };

    let order = state.orchestrator.checkout(request).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from_order(&order))))
}
