use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::error::{CoreError, CoreResult};
use marquee_core::repository::ReservationRepository;
use marquee_core::reservation::{Reservation, ReservationStatus};
use marquee_shared::{ReservationId, SeatLabel, ShowId, UserId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::show_repo::{labels_to_strings, store_err};

pub struct PgReservationRepository {
    pool: PgPool,
}

impl PgReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    show_id: Uuid,
    user_id: String,
    seats: Vec<String>,
    status: String,
    amount: i64,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_status(status: &str) -> CoreResult<ReservationStatus> {
    match status {
        "PENDING" => Ok(ReservationStatus::Pending),
        "CONFIRMED" => Ok(ReservationStatus::Confirmed),
        "EXPIRED" => Ok(ReservationStatus::Expired),
        "CANCELLED" => Ok(ReservationStatus::Cancelled),
        other => Err(CoreError::Store(format!(
            "unknown reservation status {other}"
        ))),
    }
}

impl ReservationRow {
    fn into_reservation(self) -> CoreResult<Reservation> {
        let status = parse_status(&self.status)?;
        Ok(Reservation {
            id: ReservationId::from_uuid(self.id),
            show_id: ShowId::from_uuid(self.show_id),
            user_id: UserId::new(self.user_id),
            seats: self.seats.into_iter().map(SeatLabel::new).collect(),
            status,
            amount: self.amount,
            created_at: self.created_at,
            expires_at: self.expires_at,
            updated_at: self.updated_at,
        })
    }
}

const RESERVATION_COLUMNS: &str =
    "id, show_id, user_id, seats, status, amount, created_at, expires_at, updated_at";

#[async_trait]
impl ReservationRepository for PgReservationRepository {
    async fn insert(&self, reservation: &Reservation) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reservations (id, show_id, user_id, seats, status, amount, created_at, expires_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(reservation.id.as_uuid())
        .bind(reservation.show_id.as_uuid())
        .bind(reservation.user_id.as_str())
        .bind(labels_to_strings(&reservation.seats))
        .bind(reservation.status.as_str())
        .bind(reservation.amount)
        .bind(reservation.created_at)
        .bind(reservation.expires_at)
        .bind(reservation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn get(&self, id: ReservationId) -> CoreResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(ReservationRow::into_reservation).transpose()
    }

    async fn transition(&self, id: ReservationId, to: ReservationStatus) -> CoreResult<bool> {
        // The status guard makes the terminal transition a compare-and-set:
        // of any number of racing confirm/cancel/sweep calls, exactly one
        // sees rows_affected = 1.
        let result = sqlx::query(
            "UPDATE reservations SET status = $2, updated_at = NOW() WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(id.as_uuid())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        // Distinguish a lost race from a missing row.
        let exists = sqlx::query("SELECT 1 FROM reservations WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        if exists.is_none() {
            return Err(CoreError::NotFound(format!("reservation {id}")));
        }
        Ok(false)
    }

    async fn list_lapsed(&self, now: DateTime<Utc>) -> CoreResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE status = 'PENDING' AND expires_at < $1"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter()
            .map(ReservationRow::into_reservation)
            .collect()
    }
}
