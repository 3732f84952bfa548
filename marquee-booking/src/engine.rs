use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use marquee_core::error::{CoreError, CoreResult};
use marquee_core::ledger::{HoldOutcome, SeatLedger};
use marquee_core::repository::{ReservationRepository, ShowRepository};
use marquee_core::reservation::{Reservation, ReservationStatus};
use marquee_shared::events::{SeatEvent, SeatEventKind};
use marquee_shared::{ReservationId, SeatLabel, ShowId, UserId};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Orchestrates the hold -> pay -> confirm/expire state machine per seat set.
///
/// The engine is the only writer of seat transitions. Terminal exclusivity
/// rests on two primitives: the ledger's all-or-nothing conditional hold, and
/// the reservation repository's compare-and-set status transition
/// (PENDING -> X only while still PENDING). Expiry is detected both lazily in
/// `confirm_payment` and eagerly by `sweep_expired`; the two race safely
/// because the status flip admits exactly one winner and release is
/// idempotent.
pub struct ReservationEngine {
    shows: Arc<dyn ShowRepository>,
    reservations: Arc<dyn ReservationRepository>,
    ledger: Arc<dyn SeatLedger>,
    hold_ttl: Duration,
    seat_tx: broadcast::Sender<SeatEvent>,
}

impl ReservationEngine {
    pub fn new(
        shows: Arc<dyn ShowRepository>,
        reservations: Arc<dyn ReservationRepository>,
        ledger: Arc<dyn SeatLedger>,
        hold_ttl: Duration,
        seat_tx: broadcast::Sender<SeatEvent>,
    ) -> Self {
        Self {
            shows,
            reservations,
            ledger,
            hold_ttl,
            seat_tx,
        }
    }

    fn emit(&self, show_id: ShowId, seats: &[SeatLabel], reservation_id: ReservationId, kind: SeatEventKind) {
        // Nobody listening is fine; the stream is a UI nicety.
        let _ = self.seat_tx.send(SeatEvent {
            show_id,
            seats: seats.to_vec(),
            reservation_id,
            kind,
            at: Utc::now().timestamp(),
        });
    }

    /// Claim `seats` for `user_id`. On conflict the contended seats are
    /// reported and no reservation is created.
    pub async fn request_hold(
        &self,
        show_id: ShowId,
        user_id: UserId,
        seats: Vec<SeatLabel>,
    ) -> CoreResult<Reservation> {
        let show = self
            .shows
            .get_show(show_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("show {show_id}")))?;

        if show.is_cancelled {
            return Err(CoreError::Validation(format!("show {show_id} is cancelled")));
        }
        if show.start_time <= Utc::now() {
            return Err(CoreError::Validation(format!(
                "show {show_id} has already started"
            )));
        }
        if seats.is_empty() {
            return Err(CoreError::Validation(
                "at least one seat is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for label in &seats {
            if !seen.insert(label) {
                return Err(CoreError::Validation(format!(
                    "seat {label} requested more than once"
                )));
            }
        }
        let unknown: Vec<String> = seats
            .iter()
            .filter(|label| !show.has_seat(label))
            .map(|label| label.as_str().to_string())
            .collect();
        if !unknown.is_empty() {
            return Err(CoreError::Validation(format!(
                "seats not in layout: {}",
                unknown.join(", ")
            )));
        }

        let amount = show.price * seats.len() as i64;
        let reservation = Reservation::new(show_id, user_id, seats, amount, self.hold_ttl);

        match self
            .ledger
            .try_hold(show_id, &reservation.seats, reservation.id)
            .await?
        {
            HoldOutcome::Conflict(conflicting) => Err(CoreError::Conflict(conflicting)),
            HoldOutcome::Held => {
                if let Err(e) = self.reservations.insert(&reservation).await {
                    // The hold committed but the reservation row didn't:
                    // free the seats before surfacing the failure.
                    self.ledger
                        .release(show_id, &reservation.seats, reservation.id)
                        .await?;
                    return Err(e);
                }
                self.emit(show_id, &reservation.seats, reservation.id, SeatEventKind::Held);
                info!(
                    reservation_id = %reservation.id,
                    show_id = %show_id,
                    seats = reservation.seats.len(),
                    "seats held"
                );
                Ok(reservation)
            }
        }
    }

    /// Settle a successful payment. Lapsed holds are expired on the spot and
    /// reported as such; the caller owes the refund. Repeated success
    /// callbacks after confirmation are no-ops.
    pub async fn confirm_payment(&self, id: ReservationId) -> CoreResult<Reservation> {
        loop {
            let reservation = self
                .reservations
                .get(id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("reservation {id}")))?;

            match reservation.status {
                ReservationStatus::Confirmed => return Ok(reservation),
                ReservationStatus::Expired | ReservationStatus::Cancelled => {
                    return Err(CoreError::Stale)
                }
                ReservationStatus::Pending => {
                    if reservation.is_lapsed(Utc::now()) {
                        if self
                            .reservations
                            .transition(id, ReservationStatus::Expired)
                            .await?
                        {
                            self.ledger
                                .release(reservation.show_id, &reservation.seats, id)
                                .await?;
                            self.emit(
                                reservation.show_id,
                                &reservation.seats,
                                id,
                                SeatEventKind::Released,
                            );
                            warn!(reservation_id = %id, "payment settled after hold expiry");
                            return Err(CoreError::Expired);
                        }
                        // Lost the race; re-read and decide again.
                        continue;
                    }

                    if self
                        .reservations
                        .transition(id, ReservationStatus::Confirmed)
                        .await?
                    {
                        // Seats cannot have been released: release only ever
                        // follows a terminal flip, and we just won it.
                        self.ledger
                            .confirm(reservation.show_id, &reservation.seats, id)
                            .await?;
                        self.emit(
                            reservation.show_id,
                            &reservation.seats,
                            id,
                            SeatEventKind::Booked,
                        );
                        info!(reservation_id = %id, "reservation confirmed");
                        let mut confirmed = reservation;
                        confirmed.status = ReservationStatus::Confirmed;
                        confirmed.updated_at = Utc::now();
                        return Ok(confirmed);
                    }
                }
            }
        }
    }

    /// User-initiated abort of a pending hold. Repeating a cancellation is a
    /// no-op; cancelling a confirmed or expired reservation reports Stale.
    pub async fn cancel(&self, id: ReservationId) -> CoreResult<()> {
        loop {
            let reservation = self
                .reservations
                .get(id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("reservation {id}")))?;

            match reservation.status {
                ReservationStatus::Cancelled => return Ok(()),
                ReservationStatus::Confirmed | ReservationStatus::Expired => {
                    return Err(CoreError::Stale)
                }
                ReservationStatus::Pending => {
                    if self
                        .reservations
                        .transition(id, ReservationStatus::Cancelled)
                        .await?
                    {
                        self.ledger
                            .release(reservation.show_id, &reservation.seats, id)
                            .await?;
                        self.emit(
                            reservation.show_id,
                            &reservation.seats,
                            id,
                            SeatEventKind::Released,
                        );
                        info!(reservation_id = %id, "reservation cancelled");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Expire every pending hold whose TTL lapsed, returning how many this
    /// pass actually expired. Runs concurrently with itself and with
    /// in-flight confirm/cancel calls.
    pub async fn sweep_expired(&self) -> CoreResult<usize> {
        let lapsed = self.reservations.list_lapsed(Utc::now()).await?;
        let mut expired = 0;
        for reservation in lapsed {
            if self
                .reservations
                .transition(reservation.id, ReservationStatus::Expired)
                .await?
            {
                self.ledger
                    .release(reservation.show_id, &reservation.seats, reservation.id)
                    .await?;
                self.emit(
                    reservation.show_id,
                    &reservation.seats,
                    reservation.id,
                    SeatEventKind::Released,
                );
                expired += 1;
            }
        }
        if expired > 0 {
            info!(count = expired, "expired lapsed holds");
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_core::ledger::SeatState;
    use marquee_core::show::ShowInstance;
    use marquee_shared::MovieId;
    use marquee_store::memory::{MemoryLedger, MemoryStore};

    fn labels(names: &[&str]) -> Vec<SeatLabel> {
        names.iter().map(|n| SeatLabel::from(*n)).collect()
    }

    async fn seed_show(
        store: &Arc<MemoryStore>,
        ledger: &Arc<MemoryLedger>,
        seats: &[&str],
        price: i64,
    ) -> ShowInstance {
        let show = ShowInstance::new(
            MovieId::new("tmdb-603"),
            Utc::now() + Duration::hours(2),
            price,
            labels(seats),
        )
        .unwrap();
        store.insert_show(&show).await.unwrap();
        ledger.init_seats(show.id, &show.seat_layout).await.unwrap();
        show
    }

    fn engine(
        store: &Arc<MemoryStore>,
        ledger: &Arc<MemoryLedger>,
        hold_ttl: Duration,
    ) -> ReservationEngine {
        let (seat_tx, _) = broadcast::channel(64);
        ReservationEngine::new(
            store.clone(),
            store.clone(),
            ledger.clone(),
            hold_ttl,
            seat_tx,
        )
    }

    fn setup() -> (Arc<MemoryStore>, Arc<MemoryLedger>) {
        (Arc::new(MemoryStore::new()), Arc::new(MemoryLedger::new()))
    }

    #[tokio::test]
    async fn test_hold_confirm_lifecycle() {
        let (store, ledger) = setup();
        let show = seed_show(&store, &ledger, &["A1", "A2", "A3"], 1500).await;
        let engine = engine(&store, &ledger, Duration::minutes(10));

        let reservation = engine
            .request_hold(show.id, UserId::new("user-x"), labels(&["A1", "A2"]))
            .await
            .unwrap();
        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert_eq!(reservation.amount, 3000);

        let confirmed = engine.confirm_payment(reservation.id).await.unwrap();
        assert_eq!(confirmed.status, ReservationStatus::Confirmed);

        // A duplicate success callback is a no-op.
        let again = engine.confirm_payment(reservation.id).await.unwrap();
        assert_eq!(again.status, ReservationStatus::Confirmed);

        let snapshot = ledger.snapshot(show.id).await.unwrap();
        assert_eq!(snapshot[&SeatLabel::from("A1")], SeatState::Booked);
        assert_eq!(snapshot[&SeatLabel::from("A2")], SeatState::Booked);
        assert_eq!(snapshot[&SeatLabel::from("A3")], SeatState::Free);
    }

    #[tokio::test]
    async fn test_overlapping_holds_conflict_and_retry() {
        let (store, ledger) = setup();
        let show = seed_show(&store, &ledger, &["A1", "A2", "A3"], 1000).await;
        let engine = engine(&store, &ledger, Duration::minutes(10));

        let x = engine
            .request_hold(show.id, UserId::new("user-x"), labels(&["A1", "A2"]))
            .await
            .unwrap();

        // Y overlaps on A2 only; the conflict names exactly that seat.
        let err = engine
            .request_hold(show.id, UserId::new("user-y"), labels(&["A2", "A3"]))
            .await
            .unwrap_err();
        match err {
            CoreError::Conflict(seats) => assert_eq!(seats, labels(&["A2"])),
            other => panic!("expected conflict, got {other:?}"),
        }

        // The failed hold left A3 untouched, so the retry succeeds.
        let y = engine
            .request_hold(show.id, UserId::new("user-y"), labels(&["A3"]))
            .await
            .unwrap();

        engine.confirm_payment(x.id).await.unwrap();
        engine.confirm_payment(y.id).await.unwrap();

        let snapshot = ledger.snapshot(show.id).await.unwrap();
        assert!(snapshot.values().all(|s| *s == SeatState::Booked));
    }

    #[tokio::test]
    async fn test_hold_validation() {
        let (store, ledger) = setup();
        let show = seed_show(&store, &ledger, &["A1"], 1000).await;
        let engine = engine(&store, &ledger, Duration::minutes(10));
        let user = UserId::new("user-x");

        let empty = engine.request_hold(show.id, user.clone(), vec![]).await;
        assert!(matches!(empty, Err(CoreError::Validation(_))));

        let duplicate = engine
            .request_hold(show.id, user.clone(), labels(&["A1", "A1"]))
            .await;
        assert!(matches!(duplicate, Err(CoreError::Validation(_))));

        let unknown = engine
            .request_hold(show.id, user.clone(), labels(&["Z9"]))
            .await;
        assert!(matches!(unknown, Err(CoreError::Validation(_))));

        let missing = engine
            .request_hold(ShowId::new(), user.clone(), labels(&["A1"]))
            .await;
        assert!(matches!(missing, Err(CoreError::NotFound(_))));

        store.set_cancelled(show.id).await.unwrap();
        let cancelled = engine.request_hold(show.id, user, labels(&["A1"])).await;
        assert!(matches!(cancelled, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_lapsed_hold_cannot_confirm() {
        let (store, ledger) = setup();
        let show = seed_show(&store, &ledger, &["A1"], 1000).await;
        // Zero TTL: the hold is lapsed by the time payment lands.
        let engine = engine(&store, &ledger, Duration::zero());

        let reservation = engine
            .request_hold(show.id, UserId::new("user-x"), labels(&["A1"]))
            .await
            .unwrap();

        let err = engine.confirm_payment(reservation.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Expired));

        let stored = ReservationRepository::get(store.as_ref(), reservation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ReservationStatus::Expired);

        let snapshot = ledger.snapshot(show.id).await.unwrap();
        assert_eq!(snapshot[&SeatLabel::from("A1")], SeatState::Free);

        // Any further success callback reports the terminal state.
        let late = engine.confirm_payment(reservation.id).await;
        assert!(matches!(late, Err(CoreError::Stale)));

        // And another customer can take the seat.
        let fresh = ReservationEngine::new(
            store.clone(),
            store.clone(),
            ledger.clone(),
            Duration::minutes(10),
            broadcast::channel(8).0,
        );
        fresh
            .request_hold(show.id, UserId::new("user-y"), labels(&["A1"]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_releases_and_repeats_quietly() {
        let (store, ledger) = setup();
        let show = seed_show(&store, &ledger, &["A1", "A2"], 1000).await;
        let engine = engine(&store, &ledger, Duration::minutes(10));

        let reservation = engine
            .request_hold(show.id, UserId::new("user-x"), labels(&["A1", "A2"]))
            .await
            .unwrap();

        engine.cancel(reservation.id).await.unwrap();
        engine.cancel(reservation.id).await.unwrap();

        let snapshot = ledger.snapshot(show.id).await.unwrap();
        assert!(snapshot.values().all(|s| *s == SeatState::Free));

        let confirm = engine.confirm_payment(reservation.id).await;
        assert!(matches!(confirm, Err(CoreError::Stale)));
    }

    #[tokio::test]
    async fn test_sweep_expires_only_lapsed_holds() {
        let (store, ledger) = setup();
        let show = seed_show(&store, &ledger, &["A1", "A2", "A3"], 1000).await;

        let instant = engine(&store, &ledger, Duration::zero());
        let patient = engine(&store, &ledger, Duration::minutes(10));

        let lapsed = instant
            .request_hold(show.id, UserId::new("user-x"), labels(&["A1", "A2"]))
            .await
            .unwrap();
        let live = patient
            .request_hold(show.id, UserId::new("user-y"), labels(&["A3"]))
            .await
            .unwrap();

        assert_eq!(patient.sweep_expired().await.unwrap(), 1);
        assert_eq!(patient.sweep_expired().await.unwrap(), 0);

        let stored = ReservationRepository::get(store.as_ref(), lapsed.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ReservationStatus::Expired);

        let snapshot = ledger.snapshot(show.id).await.unwrap();
        assert_eq!(snapshot[&SeatLabel::from("A1")], SeatState::Free);
        assert_eq!(snapshot[&SeatLabel::from("A2")], SeatState::Free);
        assert_eq!(snapshot[&SeatLabel::from("A3")], SeatState::Held);

        let confirmed = patient.confirm_payment(live.id).await.unwrap();
        assert_eq!(confirmed.status, ReservationStatus::Confirmed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_double_booking_under_contention() {
        let (store, ledger) = setup();
        let show = seed_show(&store, &ledger, &["A1", "A2", "A3", "A4"], 1000).await;
        let engine = Arc::new(engine(&store, &ledger, Duration::minutes(10)));

        // 16 customers race for overlapping seat pairs.
        let mut handles = Vec::new();
        for i in 0..16 {
            let engine = engine.clone();
            let show_id = show.id;
            let pair = match i % 3 {
                0 => labels(&["A1", "A2"]),
                1 => labels(&["A2", "A3"]),
                _ => labels(&["A3", "A4"]),
            };
            handles.push(tokio::spawn(async move {
                engine
                    .request_hold(show_id, UserId::new(format!("user-{i}")), pair)
                    .await
            }));
        }

        let mut winners = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(reservation) => winners.push(reservation),
                Err(CoreError::Conflict(seats)) => assert!(!seats.is_empty()),
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        // No seat may be attributed to two winning holds.
        let mut claimed = HashSet::new();
        for reservation in &winners {
            for seat in &reservation.seats {
                assert!(claimed.insert(seat.clone()), "seat {seat} double-held");
            }
        }

        // Confirm every winner; booked seats stay singly attributed.
        for reservation in &winners {
            engine.confirm_payment(reservation.id).await.unwrap();
        }
        let snapshot = ledger.snapshot(show.id).await.unwrap();
        for seat in &claimed {
            assert_eq!(snapshot[seat], SeatState::Booked);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_terminal_exclusivity_under_race() {
        for _ in 0..20 {
            let (store, ledger) = setup();
            let show = seed_show(&store, &ledger, &["A1"], 1000).await;
            let engine = Arc::new(engine(&store, &ledger, Duration::minutes(10)));

            let reservation = engine
                .request_hold(show.id, UserId::new("user-x"), labels(&["A1"]))
                .await
                .unwrap();

            let confirm = {
                let engine = engine.clone();
                let id = reservation.id;
                tokio::spawn(async move { engine.confirm_payment(id).await })
            };
            let cancel = {
                let engine = engine.clone();
                let id = reservation.id;
                tokio::spawn(async move { engine.cancel(id).await })
            };

            let confirm = confirm.await.unwrap();
            let cancel = cancel.await.unwrap();

            // Exactly one path wins; the loser observes the terminal state.
            assert!(
                confirm.is_ok() != cancel.is_ok(),
                "confirm={confirm:?} cancel={cancel:?}"
            );

            let stored = ReservationRepository::get(store.as_ref(), reservation.id)
                .await
                .unwrap()
                .unwrap();
            let snapshot = ledger.snapshot(show.id).await.unwrap();
            match stored.status {
                ReservationStatus::Confirmed => {
                    assert_eq!(snapshot[&SeatLabel::from("A1")], SeatState::Booked)
                }
                ReservationStatus::Cancelled => {
                    assert_eq!(snapshot[&SeatLabel::from("A1")], SeatState::Free)
                }
                other => panic!("non-terminal status {other:?} after race"),
            }
        }
    }
}
