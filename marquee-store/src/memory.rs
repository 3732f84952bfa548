use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::booking::Booking;
use marquee_core::error::{CoreError, CoreResult};
use marquee_core::ledger::{HoldOutcome, SeatLedger, SeatSlot, SeatState};
use marquee_core::repository::{BookingRepository, ReservationRepository, ShowRepository};
use marquee_core::reservation::{Reservation, ReservationStatus};
use marquee_core::show::ShowInstance;
use marquee_shared::{BookingId, ReservationId, SeatLabel, ShowId, UserId};
use tokio::sync::{Mutex, RwLock};

/// In-memory seat ledger. One mutex per show instance: a hold is a single
/// critical section over that show's slots (no read-then-write gap), and
/// disjoint show instances never contend.
///
/// Backs the test suite; the production wiring swaps in the Redis or
/// Postgres ledger behind the same trait.
pub struct MemoryLedger {
    shows: RwLock<HashMap<ShowId, Arc<Mutex<BTreeMap<SeatLabel, SeatSlot>>>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            shows: RwLock::new(HashMap::new()),
        }
    }

    async fn slots(&self, show_id: ShowId) -> CoreResult<Arc<Mutex<BTreeMap<SeatLabel, SeatSlot>>>> {
        let shows = self.shows.read().await;
        shows
            .get(&show_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("seat ledger for show {show_id}")))
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SeatLedger for MemoryLedger {
    async fn init_seats(&self, show_id: ShowId, labels: &[SeatLabel]) -> CoreResult<()> {
        let mut shows = self.shows.write().await;
        shows.entry(show_id).or_insert_with(|| {
            let slots = labels
                .iter()
                .map(|label| (label.clone(), SeatSlot::Free))
                .collect();
            Arc::new(Mutex::new(slots))
        });
        Ok(())
    }

    async fn try_hold(
        &self,
        show_id: ShowId,
        seats: &[SeatLabel],
        reservation_id: ReservationId,
    ) -> CoreResult<HoldOutcome> {
        let slots = self.slots(show_id).await?;
        let mut slots = slots.lock().await;

        let mut conflicts = Vec::new();
        for label in seats {
            match slots.get(label) {
                Some(SeatSlot::Free) => {}
                Some(_) => conflicts.push(label.clone()),
                None => {
                    return Err(CoreError::Validation(format!(
                        "seat {label} is not part of show {show_id}"
                    )))
                }
            }
        }
        if !conflicts.is_empty() {
            return Ok(HoldOutcome::Conflict(conflicts));
        }

        for label in seats {
            slots.insert(label.clone(), SeatSlot::Held(reservation_id));
        }
        Ok(HoldOutcome::Held)
    }

    async fn confirm(
        &self,
        show_id: ShowId,
        seats: &[SeatLabel],
        reservation_id: ReservationId,
    ) -> CoreResult<()> {
        let slots = self.slots(show_id).await?;
        let mut slots = slots.lock().await;

        // Check everything before touching anything.
        for label in seats {
            match slots.get(label) {
                Some(SeatSlot::Held(owner)) | Some(SeatSlot::Booked(owner))
                    if *owner == reservation_id => {}
                _ => return Err(CoreError::Stale),
            }
        }
        for label in seats {
            slots.insert(label.clone(), SeatSlot::Booked(reservation_id));
        }
        Ok(())
    }

    async fn release(
        &self,
        show_id: ShowId,
        seats: &[SeatLabel],
        reservation_id: ReservationId,
    ) -> CoreResult<()> {
        let slots = self.slots(show_id).await?;
        let mut slots = slots.lock().await;

        for label in seats {
            if let Some(SeatSlot::Held(owner)) = slots.get(label) {
                if *owner == reservation_id {
                    slots.insert(label.clone(), SeatSlot::Free);
                }
            }
        }
        Ok(())
    }

    async fn snapshot(&self, show_id: ShowId) -> CoreResult<BTreeMap<SeatLabel, SeatState>> {
        let slots = self.slots(show_id).await?;
        let slots = slots.lock().await;
        Ok(slots
            .iter()
            .map(|(label, slot)| (label.clone(), slot.state()))
            .collect())
    }
}

/// In-memory shows/reservations/bookings store, sharing the repository
/// contracts with the Postgres implementations.
pub struct MemoryStore {
    shows: RwLock<HashMap<ShowId, ShowInstance>>,
    reservations: Mutex<HashMap<ReservationId, Reservation>>,
    bookings: Mutex<HashMap<BookingId, Booking>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            shows: RwLock::new(HashMap::new()),
            reservations: Mutex::new(HashMap::new()),
            bookings: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShowRepository for MemoryStore {
    async fn insert_show(&self, show: &ShowInstance) -> CoreResult<()> {
        let mut shows = self.shows.write().await;
        shows.insert(show.id, show.clone());
        Ok(())
    }

    async fn get_show(&self, id: ShowId) -> CoreResult<Option<ShowInstance>> {
        let shows = self.shows.read().await;
        Ok(shows.get(&id).cloned())
    }

    async fn list_upcoming(&self, now: DateTime<Utc>) -> CoreResult<Vec<ShowInstance>> {
        let shows = self.shows.read().await;
        let mut upcoming: Vec<ShowInstance> = shows
            .values()
            .filter(|s| !s.is_cancelled && s.start_time > now)
            .cloned()
            .collect();
        upcoming.sort_by_key(|s| s.start_time);
        Ok(upcoming)
    }

    async fn set_cancelled(&self, id: ShowId) -> CoreResult<()> {
        let mut shows = self.shows.write().await;
        match shows.get_mut(&id) {
            Some(show) => {
                show.is_cancelled = true;
                Ok(())
            }
            None => Err(CoreError::NotFound(format!("show {id}"))),
        }
    }
}

#[async_trait]
impl ReservationRepository for MemoryStore {
    async fn insert(&self, reservation: &Reservation) -> CoreResult<()> {
        let mut reservations = self.reservations.lock().await;
        reservations.insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn get(&self, id: ReservationId) -> CoreResult<Option<Reservation>> {
        let reservations = self.reservations.lock().await;
        Ok(reservations.get(&id).cloned())
    }

    async fn transition(&self, id: ReservationId, to: ReservationStatus) -> CoreResult<bool> {
        let mut reservations = self.reservations.lock().await;
        let reservation = reservations
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("reservation {id}")))?;

        if reservation.status != ReservationStatus::Pending {
            return Ok(false);
        }
        reservation.status = to;
        reservation.updated_at = Utc::now();
        Ok(true)
    }

    async fn list_lapsed(&self, now: DateTime<Utc>) -> CoreResult<Vec<Reservation>> {
        let reservations = self.reservations.lock().await;
        Ok(reservations
            .values()
            .filter(|r| r.status == ReservationStatus::Pending && r.is_lapsed(now))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn insert(&self, booking: &Booking) -> CoreResult<()> {
        let mut bookings = self.bookings.lock().await;
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn find_by_reservation(&self, id: ReservationId) -> CoreResult<Option<Booking>> {
        let bookings = self.bookings.lock().await;
        Ok(bookings.values().find(|b| b.reservation_id == id).cloned())
    }

    async fn list_for_user(&self, user_id: &UserId) -> CoreResult<Vec<Booking>> {
        let bookings = self.bookings.lock().await;
        let mut mine: Vec<Booking> = bookings
            .values()
            .filter(|b| &b.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mine)
    }
}
