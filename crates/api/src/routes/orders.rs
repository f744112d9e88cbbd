//! Order lookup, listing, and cancellation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use checkout::{LineItem, Order};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::routes::parse_uuid;

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub items: Vec<LineItemResponse>,
    pub total_cents: i64,
    pub payment_id: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct LineItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub reservation_id: Option<String>,
}

impl OrderResponse {
    pub fn from_order(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            user_id: order.user_id.to_string(),
            status: order.status.to_string(),
            items: order.items.iter().map(LineItemResponse::from_item).collect(),
            total_cents: order.total().cents(),
            payment_id: order.payment_id.map(|id| id.to_string()),
            failure_reason: order.failure_reason.clone(),
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
        }
    }
}

impl LineItemResponse {
    fn from_item(item: &LineItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
            reservation_id: item.reservation_id.map(|id| id.to_string()),
        }
    }
}

#[derive(Deserialize)]
pub struct ListParams {
    pub user_id: String,
}

// -- Handlers --

/// GET /orders/:id — load an order by id.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = OrderId::from_uuid(parse_uuid(&id)?);
    let order = state.orchestrator.get_order(order_id).await?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// GET /orders?user_id=… — list a user's orders, newest first.
#[tracing::instrument(skip(state, params))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let user_id = UserId::from_uuid(parse_uuid(&params.user_id)?);
    let orders = state.orchestrator.list_orders(user_id).await;
    Ok(Json(orders.iter().map(OrderResponse::from_order).collect()))
}

/// POST /orders/:id/cancel — cancel an order that has not shipped.
#[tracing::instrument(skip(state))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = OrderId::from_uuid(parse_uuid(&id)?);
    let order = state.orchestrator.cancel(order_id).await?;
    Ok(Json(OrderResponse::from_order(&order)))
}
