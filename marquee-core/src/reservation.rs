use chrono::{DateTime, Duration, Utc};
use marquee_shared::{ReservationId, SeatLabel, ShowId, UserId};
use serde::{Deserialize, Serialize};

/// Reservation lifecycle. `Pending` is the only non-terminal state; exactly
/// one of the other three ever wins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Expired,
    Cancelled,
}

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Expired => "EXPIRED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

/// A time-bounded exclusive claim over a set of seats, pending payment.
///
/// While `Pending`, every seat in `seats` is held in the ledger attributed to
/// this reservation's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub show_id: ShowId,
    pub user_id: UserId,
    pub seats: Vec<SeatLabel>,
    pub status: ReservationStatus,
    /// seats.len() x show price, minor currency units.
    pub amount: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(
        show_id: ShowId,
        user_id: UserId,
        seats: Vec<SeatLabel>,
        amount: i64,
        hold_ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ReservationId::new(),
            show_id,
            user_id,
            seats,
            status: ReservationStatus::Pending,
            amount,
            created_at: now,
            expires_at: now + hold_ttl,
            updated_at: now,
        }
    }

    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
