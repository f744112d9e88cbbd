//! Reservation inspection endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::ReservationId;
use inventory::Reservation;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::parse_uuid;

#[derive(Serialize)]
pub struct ReservationResponse {
    pub id: String,
    pub product_id: String,
    pub quantity: u32,
    pub order_reference: String,
    pub state: String,
    pub reserved_at: String,
    pub resolved_at: Option<String>,
}

impl ReservationResponse {
    fn from_reservation(reservation: &Reservation) -> Self {
        Self {
            id: reservation.id.to_string(),
            product_id: reservation.product_id.to_string(),
            quantity: reservation.quantity,
            order_reference: reservation.order_reference.to_string(),
            state: reservation.state.as_str().to_string(),
            reserved_at: reservation.reserved_at.to_rfc3339(),
            resolved_at: reservation.resolved_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// GET /reservations/:id — inspect a reservation record.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let reservation_id = ReservationId::from_uuid(parse_uuid(&id)?);
    let reservation = state
        .engine
        .reservation(reservation_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("reservation {id} not found")))?;
    Ok(Json(ReservationResponse::from_reservation(&reservation)))
}
