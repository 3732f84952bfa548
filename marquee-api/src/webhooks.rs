use axum::{extract::State, routing::post, Json, Router};
use marquee_shared::{BookingId, ReservationId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Terminal payment callback from the gateway. Delivery is at-least-once;
/// routing through the reservation engine keeps the effect exactly-once.
#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub reservation_id: Uuid,
    /// "succeeded" or "failed".
    pub status: String,
    pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub booking_id: Option<BookingId>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments", post(handle_payment_webhook))
}

async fn handle_payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaymentWebhook>,
) -> Result<Json<WebhookAck>, AppError> {
    let reservation_id = ReservationId::from_uuid(payload.reservation_id);
    tracing::info!(
        reservation_id = %reservation_id,
        status = %payload.status,
        "payment webhook received"
    );

    match payload.status.as_str() {
        "succeeded" => {
            let booking = state
                .bookings
                .on_payment_success(reservation_id, payload.reference)
                .await?;
            Ok(Json(WebhookAck {
                received: true,
                booking_id: Some(booking.id),
            }))
        }
        "failed" => {
            state.bookings.on_payment_failure(reservation_id).await?;
            Ok(Json(WebhookAck {
                received: true,
                booking_id: None,
            }))
        }
        other => Err(AppError::Core(marquee_core::error::CoreError::Validation(
            format!("unknown payment status {other}"),
        ))),
    }
}
