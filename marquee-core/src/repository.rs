use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_shared::{ReservationId, ShowId, UserId};

use crate::booking::Booking;
use crate::error::CoreResult;
use crate::reservation::{Reservation, ReservationStatus};
use crate::show::ShowInstance;

/// Repository for show instances. Creation is single-writer (admin action);
/// no further concurrency concerns.
#[async_trait]
pub trait ShowRepository: Send + Sync {
    async fn insert_show(&self, show: &ShowInstance) -> CoreResult<()>;

    async fn get_show(&self, id: ShowId) -> CoreResult<Option<ShowInstance>>;

    /// Upcoming, non-cancelled instances ordered by start time.
    async fn list_upcoming(&self, now: DateTime<Utc>) -> CoreResult<Vec<ShowInstance>>;

    /// Soft-cancellation flag; the row is retained for audit.
    async fn set_cancelled(&self, id: ShowId) -> CoreResult<()>;
}

/// Repository for reservation rows.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn insert(&self, reservation: &Reservation) -> CoreResult<()>;

    async fn get(&self, id: ReservationId) -> CoreResult<Option<Reservation>>;

    /// Atomic conditional transition PENDING -> `to`. Returns whether this
    /// caller won; a `false` means another terminal path got there first.
    /// This is the primitive that keeps confirm, cancel and the expiry sweep
    /// mutually exclusive per reservation.
    async fn transition(&self, id: ReservationId, to: ReservationStatus) -> CoreResult<bool>;

    /// PENDING reservations whose expiry is strictly in the past.
    async fn list_lapsed(&self, now: DateTime<Utc>) -> CoreResult<Vec<Reservation>>;
}

/// Repository for confirmed booking records.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert(&self, booking: &Booking) -> CoreResult<()>;

    /// At most one booking ever exists per reservation; used to make the
    /// payment-success callback idempotent.
    async fn find_by_reservation(&self, id: ReservationId) -> CoreResult<Option<Booking>>;

    async fn list_for_user(&self, user_id: &UserId) -> CoreResult<Vec<Booking>>;
}
