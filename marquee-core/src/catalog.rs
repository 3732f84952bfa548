use async_trait::async_trait;
use marquee_shared::MovieId;
use serde::{Deserialize, Serialize};

/// Display projection of a catalog movie. The core only ever uses `movie_id`
/// as an opaque reference; the rest is for UI listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NowPlayingMovie {
    pub movie_id: MovieId,
    pub title: String,
    pub poster_path: Option<String>,
    pub vote_average: f64,
    pub vote_count: i64,
}

/// Read-only adapter over the external movie catalog.
#[async_trait]
pub trait CatalogAdapter: Send + Sync {
    async fn fetch_now_playing(
        &self,
    ) -> Result<Vec<NowPlayingMovie>, Box<dyn std::error::Error + Send + Sync>>;
}
