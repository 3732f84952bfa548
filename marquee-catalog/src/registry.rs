use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use marquee_core::error::{CoreError, CoreResult};
use marquee_core::ledger::SeatLedger;
use marquee_core::repository::ShowRepository;
use marquee_core::show::ShowInstance;
use marquee_shared::{MovieId, SeatLabel, ShowId};
use tracing::info;

/// Stores show instances created by administrators and seeds the seat ledger
/// for each. Creation is a single-writer admin action; the registry holds no
/// state of its own.
pub struct ShowRegistry {
    shows: Arc<dyn ShowRepository>,
    ledger: Arc<dyn SeatLedger>,
}

impl ShowRegistry {
    pub fn new(shows: Arc<dyn ShowRepository>, ledger: Arc<dyn SeatLedger>) -> Self {
        Self { shows, ledger }
    }

    /// Create one show instance and initialize one FREE slot per seat label.
    pub async fn create_show(
        &self,
        movie_id: MovieId,
        start_time: DateTime<Utc>,
        price: i64,
        seat_layout: Vec<SeatLabel>,
    ) -> CoreResult<ShowInstance> {
        let show = ShowInstance::new(movie_id, start_time, price, seat_layout)?;
        self.shows.insert_show(&show).await?;
        self.ledger.init_seats(show.id, &show.seat_layout).await?;
        info!(show_id = %show.id, movie_id = %show.movie_id, "show created");
        Ok(show)
    }

    /// Bulk add: one instance per start time, all sharing a movie, price and
    /// layout. Duplicate times within the request are rejected up front, so
    /// either every instance is created or none is registered with a partial
    /// schedule in mind.
    pub async fn create_schedule(
        &self,
        movie_id: MovieId,
        showtimes: &[DateTime<Utc>],
        price: i64,
        seat_layout: Vec<SeatLabel>,
    ) -> CoreResult<Vec<ShowInstance>> {
        if showtimes.is_empty() {
            return Err(CoreError::Validation(
                "at least one showtime is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for time in showtimes {
            if !seen.insert(time) {
                return Err(CoreError::Validation(format!(
                    "duplicate showtime {time} in schedule"
                )));
            }
        }

        let mut created = Vec::with_capacity(showtimes.len());
        for time in showtimes {
            created.push(
                self.create_show(movie_id.clone(), *time, price, seat_layout.clone())
                    .await?,
            );
        }
        Ok(created)
    }

    pub async fn get_show(&self, id: ShowId) -> CoreResult<ShowInstance> {
        self.shows
            .get_show(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("show {id}")))
    }

    pub async fn list_shows(&self) -> CoreResult<Vec<ShowInstance>> {
        self.shows.list_upcoming(Utc::now()).await
    }

    /// Soft-cancel: the instance stays on record, new holds against it are
    /// rejected by the reservation engine.
    pub async fn cancel_show(&self, id: ShowId) -> CoreResult<()> {
        // Verify existence first so an unknown id reports NotFound rather
        // than silently succeeding.
        self.get_show(id).await?;
        self.shows.set_cancelled(id).await?;
        info!(show_id = %id, "show cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use marquee_core::ledger::SeatState;
    use marquee_store::memory::{MemoryLedger, MemoryStore};

    fn registry() -> (ShowRegistry, Arc<MemoryLedger>) {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        (ShowRegistry::new(store, ledger.clone()), ledger)
    }

    fn layout(labels: &[&str]) -> Vec<SeatLabel> {
        labels.iter().map(|l| SeatLabel::from(*l)).collect()
    }

    #[tokio::test]
    async fn test_create_show_seeds_ledger() {
        let (registry, ledger) = registry();

        let show = registry
            .create_show(
                MovieId::new("tmdb-157336"),
                Utc::now() + Duration::hours(2),
                1200,
                layout(&["A1", "A2"]),
            )
            .await
            .unwrap();

        let snapshot = ledger.snapshot(show.id).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.values().all(|s| *s == SeatState::Free));
    }

    #[tokio::test]
    async fn test_schedule_rejects_duplicate_times() {
        let (registry, _) = registry();
        let at = Utc::now() + Duration::hours(2);

        let result = registry
            .create_schedule(MovieId::new("tmdb-157336"), &[at, at], 1200, layout(&["A1"]))
            .await;

        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_schedule_creates_one_instance_per_time() {
        let (registry, _) = registry();
        let base = Utc::now() + Duration::hours(2);
        let times = vec![base, base + Duration::hours(3), base + Duration::hours(6)];

        let created = registry
            .create_schedule(MovieId::new("tmdb-157336"), &times, 1200, layout(&["A1", "A2"]))
            .await
            .unwrap();

        assert_eq!(created.len(), 3);
        let ids: HashSet<_> = created.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), 3);

        let listed = registry.list_shows().await.unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed.windows(2).all(|w| w[0].start_time <= w[1].start_time));
    }

    #[tokio::test]
    async fn test_cancel_show() {
        let (registry, _) = registry();
        let show = registry
            .create_show(
                MovieId::new("tmdb-157336"),
                Utc::now() + Duration::hours(2),
                1200,
                layout(&["A1"]),
            )
            .await
            .unwrap();

        registry.cancel_show(show.id).await.unwrap();
        assert!(registry.get_show(show.id).await.unwrap().is_cancelled);

        // Cancelled shows drop out of the upcoming listing.
        assert!(registry.list_shows().await.unwrap().is_empty());

        let missing = registry.cancel_show(ShowId::new()).await;
        assert!(matches!(missing, Err(CoreError::NotFound(_))));
    }
}
