use std::collections::BTreeMap;

use async_trait::async_trait;
use marquee_shared::{ReservationId, SeatLabel, ShowId};
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;

/// Public projection of a seat's state, as rendered on seat maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatState {
    Free,
    Held,
    Booked,
}

/// Internal slot value: held and booked seats carry the reservation they are
/// attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatSlot {
    Free,
    Held(ReservationId),
    Booked(ReservationId),
}

impl SeatSlot {
    pub fn state(&self) -> SeatState {
        match self {
            Self::Free => SeatState::Free,
            Self::Held(_) => SeatState::Held,
            Self::Booked(_) => SeatState::Booked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldOutcome {
    /// Every requested seat transitioned FREE -> HELD.
    Held,
    /// No seat changed state; the listed seats were unavailable.
    Conflict(Vec<SeatLabel>),
}

/// Single source of truth for seat availability.
///
/// Every mutation is conditional on the expected prior state, so concurrent
/// callers can never lose updates: of two racing holds over overlapping
/// seats, exactly one observes `Held` and the other `Conflict`. Each
/// operation is atomic per show instance; disjoint show instances never
/// contend.
///
/// No other component reads or writes seat slots directly.
#[async_trait]
pub trait SeatLedger: Send + Sync {
    /// Seed one FREE slot per label. Idempotent; called by the show registry
    /// at creation time.
    async fn init_seats(&self, show_id: ShowId, labels: &[SeatLabel]) -> CoreResult<()>;

    /// All-or-nothing hold: every listed seat moves FREE -> HELD(reservation)
    /// only if all are currently FREE. Otherwise nothing changes state and
    /// the unavailable seats are reported.
    async fn try_hold(
        &self,
        show_id: ShowId,
        seats: &[SeatLabel],
        reservation_id: ReservationId,
    ) -> CoreResult<HoldOutcome>;

    /// Move every listed seat HELD(reservation) -> BOOKED(reservation).
    /// Fails `Stale` without mutating anything if the seats are no longer
    /// attributed to this reservation. Re-confirming already-booked seats of
    /// the same reservation is a no-op.
    async fn confirm(
        &self,
        show_id: ShowId,
        seats: &[SeatLabel],
        reservation_id: ReservationId,
    ) -> CoreResult<()>;

    /// Move every seat still HELD(reservation) back to FREE. Idempotent:
    /// seats already FREE, or BOOKED through another terminal path, are left
    /// untouched.
    async fn release(
        &self,
        show_id: ShowId,
        seats: &[SeatLabel],
        reservation_id: ReservationId,
    ) -> CoreResult<()>;

    /// Read-only snapshot for seat-map rendering.
    async fn snapshot(&self, show_id: ShowId) -> CoreResult<BTreeMap<SeatLabel, SeatState>>;
}
