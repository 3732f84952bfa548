use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::booking::Booking;
use marquee_core::error::CoreResult;
use marquee_core::repository::BookingRepository;
use marquee_shared::{BookingId, ReservationId, SeatLabel, ShowId, UserId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::show_repo::{labels_to_strings, store_err};

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    reservation_id: Uuid,
    show_id: Uuid,
    user_id: String,
    seats: Vec<String>,
    amount: i64,
    is_paid: bool,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: BookingId::from_uuid(row.id),
            reservation_id: ReservationId::from_uuid(row.reservation_id),
            show_id: ShowId::from_uuid(row.show_id),
            user_id: UserId::new(row.user_id),
            seats: row.seats.into_iter().map(SeatLabel::new).collect(),
            amount: row.amount,
            is_paid: row.is_paid,
            payment_reference: row.payment_reference,
            created_at: row.created_at,
        }
    }
}

const BOOKING_COLUMNS: &str =
    "id, reservation_id, show_id, user_id, seats, amount, is_paid, payment_reference, created_at";

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn insert(&self, booking: &Booking) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, reservation_id, show_id, user_id, seats, amount, is_paid, payment_reference, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(booking.id.as_uuid())
        .bind(booking.reservation_id.as_uuid())
        .bind(booking.show_id.as_uuid())
        .bind(booking.user_id.as_str())
        .bind(labels_to_strings(&booking.seats))
        .bind(booking.amount)
        .bind(booking.is_paid)
        .bind(booking.payment_reference.as_deref())
        .bind(booking.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn find_by_reservation(&self, id: ReservationId) -> CoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE reservation_id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(row.map(Booking::from))
    }

    async fn list_for_user(&self, user_id: &UserId) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(Booking::from).collect())
    }
}
