use std::collections::BTreeMap;

use async_trait::async_trait;
use marquee_core::error::{CoreError, CoreResult};
use marquee_core::ledger::{HoldOutcome, SeatLedger, SeatState};
use marquee_shared::{ReservationId, SeatLabel, ShowId};
use sqlx::PgPool;

use crate::show_repo::{labels_to_strings, store_err};

/// Postgres seat ledger. Every mutation is a conditional UPDATE guarded by
/// the expected prior state, with the row count checked inside the
/// transaction, so a hold either applies to every requested seat or rolls
/// back without a trace.
pub struct PgSeatLedger {
    pool: PgPool,
}

impl PgSeatLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SeatLedger for PgSeatLedger {
    async fn init_seats(&self, show_id: ShowId, labels: &[SeatLabel]) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO seat_states (show_id, seat_label, state)
            SELECT $1, label, 'FREE' FROM UNNEST($2::text[]) AS label
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(show_id.as_uuid())
        .bind(labels_to_strings(labels))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn try_hold(
        &self,
        show_id: ShowId,
        seats: &[SeatLabel],
        reservation_id: ReservationId,
    ) -> CoreResult<HoldOutcome> {
        let labels = labels_to_strings(seats);

        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let result = sqlx::query(
            r#"
            UPDATE seat_states SET state = 'HELD', reservation_id = $3
            WHERE show_id = $1 AND seat_label = ANY($2) AND state = 'FREE'
            "#,
        )
        .bind(show_id.as_uuid())
        .bind(&labels)
        .bind(reservation_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == seats.len() as u64 {
            tx.commit().await.map_err(store_err)?;
            return Ok(HoldOutcome::Held);
        }

        // Not every seat was free: undo and report the blockers. The report
        // is advisory; the hold decision itself was race-free.
        tx.rollback().await.map_err(store_err)?;

        let taken: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT seat_label FROM seat_states
            WHERE show_id = $1 AND seat_label = ANY($2) AND state <> 'FREE'
            "#,
        )
        .bind(show_id.as_uuid())
        .bind(&labels)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        if taken.is_empty() {
            // No conflicting row means a requested label has no slot at all.
            return Err(CoreError::Validation(format!(
                "request names seats outside show {show_id}"
            )));
        }
        Ok(HoldOutcome::Conflict(
            taken.into_iter().map(|(label,)| SeatLabel::new(label)).collect(),
        ))
    }

    async fn confirm(
        &self,
        show_id: ShowId,
        seats: &[SeatLabel],
        reservation_id: ReservationId,
    ) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let result = sqlx::query(
            r#"
            UPDATE seat_states SET state = 'BOOKED'
            WHERE show_id = $1 AND seat_label = ANY($2)
              AND reservation_id = $3 AND state IN ('HELD', 'BOOKED')
            "#,
        )
        .bind(show_id.as_uuid())
        .bind(labels_to_strings(seats))
        .bind(reservation_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        if result.rows_affected() != seats.len() as u64 {
            tx.rollback().await.map_err(store_err)?;
            return Err(CoreError::Stale);
        }
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn release(
        &self,
        show_id: ShowId,
        seats: &[SeatLabel],
        reservation_id: ReservationId,
    ) -> CoreResult<()> {
        sqlx::query(
            r#"
            UPDATE seat_states SET state = 'FREE', reservation_id = NULL
            WHERE show_id = $1 AND seat_label = ANY($2)
              AND reservation_id = $3 AND state = 'HELD'
            "#,
        )
        .bind(show_id.as_uuid())
        .bind(labels_to_strings(seats))
        .bind(reservation_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn snapshot(&self, show_id: ShowId) -> CoreResult<BTreeMap<SeatLabel, SeatState>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT seat_label, state FROM seat_states WHERE show_id = $1")
                .bind(show_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(store_err)?;

        if rows.is_empty() {
            return Err(CoreError::NotFound(format!("seat ledger for show {show_id}")));
        }

        rows.into_iter()
            .map(|(label, state)| {
                let state = match state.as_str() {
                    "FREE" => SeatState::Free,
                    "HELD" => SeatState::Held,
                    "BOOKED" => SeatState::Booked,
                    other => return Err(CoreError::Store(format!("unknown seat state {other}"))),
                };
                Ok((SeatLabel::new(label), state))
            })
            .collect()
    }
}
