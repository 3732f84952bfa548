use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use marquee_booking::CheckoutSession;
use marquee_core::booking::Booking;
use marquee_shared::{ReservationId, SeatLabel, ShowId, UserId};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    show_id: Uuid,
    user_id: String,
    seats: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ListBookingsParams {
    user_id: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_bookings))
        .route("/v1/bookings/{reservation_id}/cancel", post(cancel_booking))
}

async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<CheckoutSession>), AppError> {
    let seats: Vec<SeatLabel> = req.seats.into_iter().map(SeatLabel::new).collect();
    let checkout = state
        .bookings
        .create_booking(
            ShowId::from_uuid(req.show_id),
            UserId::new(req.user_id),
            seats,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(checkout)))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state
        .bookings
        .on_payment_failure(ReservationId::from_uuid(reservation_id))
        .await?;
    Ok(Json(json!({ "status": "CANCELLED" })))
}

async fn list_bookings(
    State(state): State<AppState>,
    Query(params): Query<ListBookingsParams>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state
        .bookings
        .list_bookings(&UserId::new(params.user_id))
        .await?;
    Ok(Json(bookings))
}
