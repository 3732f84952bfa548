use std::collections::HashSet;

use chrono::{DateTime, Utc};
use marquee_shared::{MovieId, SeatLabel, ShowId};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// One scheduled screening of a movie.
///
/// Immutable after creation apart from soft-cancellation; retained
/// indefinitely for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowInstance {
    pub id: ShowId,
    pub movie_id: MovieId,
    pub start_time: DateTime<Utc>,
    /// Per-seat price in minor currency units.
    pub price: i64,
    /// Ordered set of valid seat labels for this instance.
    pub seat_layout: Vec<SeatLabel>,
    pub is_cancelled: bool,
    pub created_at: DateTime<Utc>,
}

impl ShowInstance {
    pub fn new(
        movie_id: MovieId,
        start_time: DateTime<Utc>,
        price: i64,
        seat_layout: Vec<SeatLabel>,
    ) -> CoreResult<Self> {
        if price <= 0 {
            return Err(CoreError::Validation(format!(
                "price must be positive, got {price}"
            )));
        }
        if seat_layout.is_empty() {
            return Err(CoreError::Validation(
                "seat layout must not be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for label in &seat_layout {
            if !seen.insert(label) {
                return Err(CoreError::Validation(format!(
                    "duplicate seat label {label} in layout"
                )));
            }
        }

        Ok(Self {
            id: ShowId::new(),
            movie_id,
            start_time,
            price,
            seat_layout,
            is_cancelled: false,
            created_at: Utc::now(),
        })
    }

    pub fn has_seat(&self, label: &SeatLabel) -> bool {
        self.seat_layout.contains(label)
    }
}
