use async_trait::async_trait;
use marquee_core::catalog::{CatalogAdapter, NowPlayingMovie};
use marquee_shared::MovieId;

/// Catalog adapter backed by a fixed movie list, seeded from configuration.
///
/// The adapter trait is the integration seam for a real catalog service; the
/// platform itself only ever passes `movie_id` through as an opaque
/// reference.
pub struct StaticCatalog {
    movies: Vec<NowPlayingMovie>,
}

impl StaticCatalog {
    pub fn new(movies: Vec<NowPlayingMovie>) -> Self {
        Self { movies }
    }

    /// Small built-in listing for development setups with no catalog
    /// configured.
    pub fn sample() -> Self {
        let entry = |id: &str, title: &str, avg: f64, count: i64| NowPlayingMovie {
            movie_id: MovieId::new(id),
            title: title.to_string(),
            poster_path: Some(format!("/posters/{id}.jpg")),
            vote_average: avg,
            vote_count: count,
        };
        Self::new(vec![
            entry("tmdb-603", "The Matrix", 8.2, 24601),
            entry("tmdb-157336", "Interstellar", 8.4, 33214),
            entry("tmdb-27205", "Inception", 8.3, 35871),
        ])
    }
}

#[async_trait]
impl CatalogAdapter for StaticCatalog {
    async fn fetch_now_playing(
        &self,
    ) -> Result<Vec<NowPlayingMovie>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.movies.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_catalog_lists_configured_movies() {
        let catalog = StaticCatalog::sample();
        let movies = catalog.fetch_now_playing().await.unwrap();
        assert_eq!(movies.len(), 3);
        assert!(movies.iter().any(|m| m.movie_id == MovieId::new("tmdb-603")));
    }
}
