use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::error::{CoreError, CoreResult};
use marquee_core::repository::ShowRepository;
use marquee_core::show::ShowInstance;
use marquee_shared::{MovieId, SeatLabel, ShowId};
use sqlx::PgPool;
use uuid::Uuid;

pub(crate) fn store_err(e: sqlx::Error) -> CoreError {
    CoreError::Store(e.to_string())
}

pub(crate) fn labels_to_strings(labels: &[SeatLabel]) -> Vec<String> {
    labels.iter().map(|l| l.as_str().to_string()).collect()
}

pub struct PgShowRepository {
    pool: PgPool,
}

impl PgShowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ShowRow {
    id: Uuid,
    movie_id: String,
    start_time: DateTime<Utc>,
    price: i64,
    seat_layout: Vec<String>,
    is_cancelled: bool,
    created_at: DateTime<Utc>,
}

impl From<ShowRow> for ShowInstance {
    fn from(row: ShowRow) -> Self {
        ShowInstance {
            id: ShowId::from_uuid(row.id),
            movie_id: MovieId::new(row.movie_id),
            start_time: row.start_time,
            price: row.price,
            seat_layout: row.seat_layout.into_iter().map(SeatLabel::new).collect(),
            is_cancelled: row.is_cancelled,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ShowRepository for PgShowRepository {
    async fn insert_show(&self, show: &ShowInstance) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO shows (id, movie_id, start_time, price, seat_layout, is_cancelled, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(show.id.as_uuid())
        .bind(show.movie_id.as_str())
        .bind(show.start_time)
        .bind(show.price)
        .bind(labels_to_strings(&show.seat_layout))
        .bind(show.is_cancelled)
        .bind(show.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn get_show(&self, id: ShowId) -> CoreResult<Option<ShowInstance>> {
        let row = sqlx::query_as::<_, ShowRow>(
            "SELECT id, movie_id, start_time, price, seat_layout, is_cancelled, created_at FROM shows WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(row.map(ShowInstance::from))
    }

    async fn list_upcoming(&self, now: DateTime<Utc>) -> CoreResult<Vec<ShowInstance>> {
        let rows = sqlx::query_as::<_, ShowRow>(
            r#"
            SELECT id, movie_id, start_time, price, seat_layout, is_cancelled, created_at
            FROM shows
            WHERE NOT is_cancelled AND start_time > $1
            ORDER BY start_time
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(ShowInstance::from).collect())
    }

    async fn set_cancelled(&self, id: ShowId) -> CoreResult<()> {
        let result = sqlx::query("UPDATE shows SET is_cancelled = TRUE WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("show {id}")));
        }
        Ok(())
    }
}
