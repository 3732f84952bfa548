use serde::{Deserialize, Serialize};

use crate::ids::{ReservationId, SeatLabel, ShowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatEventKind {
    Held,
    Released,
    Booked,
}

/// Broadcast whenever seats change state, so seat-map views can refresh
/// without polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatEvent {
    pub show_id: ShowId,
    pub seats: Vec<SeatLabel>,
    pub reservation_id: ReservationId,
    pub kind: SeatEventKind,
    pub at: i64,
}
