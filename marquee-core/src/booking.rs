use chrono::{DateTime, Utc};
use marquee_shared::{BookingId, ReservationId, SeatLabel, ShowId, UserId};
use serde::{Deserialize, Serialize};

use crate::reservation::Reservation;

/// Durable record of a confirmed reservation. Immutable once paid; refunds
/// and cancellation of paid bookings are an administrative flow outside this
/// core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub reservation_id: ReservationId,
    pub show_id: ShowId,
    pub user_id: UserId,
    pub seats: Vec<SeatLabel>,
    pub amount: i64,
    pub is_paid: bool,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// The only way a booking comes into existence: as the terminal artifact
    /// of a confirmed reservation.
    pub fn from_reservation(reservation: &Reservation, payment_reference: Option<String>) -> Self {
        Self {
            id: BookingId::new(),
            reservation_id: reservation.id,
            show_id: reservation.show_id,
            user_id: reservation.user_id.clone(),
            seats: reservation.seats.clone(),
            amount: reservation.amount,
            is_paid: true,
            payment_reference,
            created_at: Utc::now(),
        }
    }
}
