use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use marquee_core::booking::Booking;
use marquee_core::error::{CoreError, CoreResult};
use marquee_core::payment::PaymentAdapter;
use marquee_core::repository::BookingRepository;
use marquee_shared::{ReservationId, SeatLabel, ShowId, UserId};
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::ReservationEngine;

/// What the client needs to complete payment for a fresh hold.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub reservation_id: ReservationId,
    pub amount: i64,
    pub currency: String,
    pub expires_at: DateTime<Utc>,
    pub payment_handle: String,
    pub payment_url: Option<String>,
}

/// Public-facing booking operations: compose the reservation engine with the
/// payment gateway, and own Booking creation once the engine reports
/// confirmation.
pub struct BookingService {
    engine: Arc<ReservationEngine>,
    payments: Arc<dyn PaymentAdapter>,
    bookings: Arc<dyn BookingRepository>,
    currency: String,
}

impl BookingService {
    pub fn new(
        engine: Arc<ReservationEngine>,
        payments: Arc<dyn PaymentAdapter>,
        bookings: Arc<dyn BookingRepository>,
        currency: String,
    ) -> Self {
        Self {
            engine,
            payments,
            bookings,
            currency,
        }
    }

    /// Hold the seats, then open a payment session keyed by the reservation.
    /// The gateway call happens strictly after the hold committed; if the
    /// session cannot be opened the hold is cancelled right away rather than
    /// left for the sweeper.
    pub async fn create_booking(
        &self,
        show_id: ShowId,
        user_id: UserId,
        seats: Vec<SeatLabel>,
    ) -> CoreResult<CheckoutSession> {
        let reservation = self.engine.request_hold(show_id, user_id, seats).await?;

        match self
            .payments
            .create_session(reservation.id, reservation.amount, &self.currency)
            .await
        {
            Ok(session) => Ok(CheckoutSession {
                reservation_id: reservation.id,
                amount: reservation.amount,
                currency: self.currency.clone(),
                expires_at: reservation.expires_at,
                payment_handle: session.handle,
                payment_url: session.checkout_url,
            }),
            Err(e) => {
                if let Err(cancel_err) = self.engine.cancel(reservation.id).await {
                    warn!(
                        reservation_id = %reservation.id,
                        error = %cancel_err,
                        "failed to cancel hold after gateway error"
                    );
                }
                Err(CoreError::Store(format!("payment gateway: {e}")))
            }
        }
    }

    /// Gateway success callback. Tolerates repeated delivery: at most one
    /// booking row ever exists per reservation.
    pub async fn on_payment_success(
        &self,
        reservation_id: ReservationId,
        payment_reference: Option<String>,
    ) -> CoreResult<Booking> {
        let reservation = self.engine.confirm_payment(reservation_id).await?;

        if let Some(existing) = self.bookings.find_by_reservation(reservation_id).await? {
            return Ok(existing);
        }

        let booking = Booking::from_reservation(&reservation, payment_reference);
        self.bookings.insert(&booking).await?;
        info!(
            booking_id = %booking.id,
            reservation_id = %reservation_id,
            amount = booking.amount,
            "booking created"
        );
        Ok(booking)
    }

    /// Gateway failure callback: abort the hold so the seats return to the
    /// pool immediately.
    pub async fn on_payment_failure(&self, reservation_id: ReservationId) -> CoreResult<()> {
        self.engine.cancel(reservation_id).await
    }

    /// Read-only listing. Reads are idempotent, so a flaky store is retried
    /// with a short backoff; writes never take this path.
    pub async fn list_bookings(&self, user_id: &UserId) -> CoreResult<Vec<Booking>> {
        let mut attempt: u32 = 0;
        loop {
            match self.bookings.list_for_user(user_id).await {
                Err(CoreError::Store(msg)) if attempt < 2 => {
                    attempt += 1;
                    warn!(attempt, error = %msg, "booking list read failed, backing off");
                    tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt))).await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use marquee_core::ledger::{SeatLedger, SeatState};
    use marquee_core::repository::ShowRepository;
    use marquee_core::show::ShowInstance;
    use marquee_shared::MovieId;
    use marquee_store::memory::{MemoryLedger, MemoryStore};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::broadcast;

    use crate::payment::MockPaymentAdapter;

    fn labels(names: &[&str]) -> Vec<SeatLabel> {
        names.iter().map(|n| SeatLabel::from(*n)).collect()
    }

    struct Harness {
        store: Arc<MemoryStore>,
        ledger: Arc<MemoryLedger>,
        service: BookingService,
    }

    fn harness_with(bookings: Arc<dyn BookingRepository>, hold_ttl: ChronoDuration) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let engine = Arc::new(ReservationEngine::new(
            store.clone(),
            store.clone(),
            ledger.clone(),
            hold_ttl,
            broadcast::channel(64).0,
        ));
        let service = BookingService::new(
            engine,
            Arc::new(MockPaymentAdapter),
            bookings,
            "USD".to_string(),
        );
        Harness {
            store,
            ledger,
            service,
        }
    }

    fn harness(hold_ttl: ChronoDuration) -> Harness {
        let bookings = Arc::new(MemoryStore::new());
        harness_with(bookings, hold_ttl)
    }

    async fn seed_show(harness: &Harness, seats: &[&str], price: i64) -> ShowInstance {
        let show = ShowInstance::new(
            MovieId::new("tmdb-27205"),
            Utc::now() + ChronoDuration::hours(2),
            price,
            labels(seats),
        )
        .unwrap();
        harness.store.insert_show(&show).await.unwrap();
        harness
            .ledger
            .init_seats(show.id, &show.seat_layout)
            .await
            .unwrap();
        show
    }

    #[tokio::test]
    async fn test_create_booking_opens_checkout_session() {
        let harness = harness(ChronoDuration::minutes(10));
        let show = seed_show(&harness, &["A1", "A2"], 1250).await;

        let checkout = harness
            .service
            .create_booking(show.id, UserId::new("user-x"), labels(&["A1", "A2"]))
            .await
            .unwrap();

        assert_eq!(checkout.amount, 2500);
        assert_eq!(checkout.currency, "USD");
        assert!(checkout.payment_handle.starts_with("mock_cs_"));
        assert!(checkout.payment_url.is_some());
    }

    #[tokio::test]
    async fn test_success_callback_is_idempotent() {
        let harness = harness(ChronoDuration::minutes(10));
        let show = seed_show(&harness, &["A1"], 900).await;
        let user = UserId::new("user-x");

        let checkout = harness
            .service
            .create_booking(show.id, user.clone(), labels(&["A1"]))
            .await
            .unwrap();

        let first = harness
            .service
            .on_payment_success(checkout.reservation_id, Some("pay_123".to_string()))
            .await
            .unwrap();
        let second = harness
            .service
            .on_payment_success(checkout.reservation_id, Some("pay_123".to_string()))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert!(first.is_paid);
        assert_eq!(first.payment_reference.as_deref(), Some("pay_123"));

        let mine = harness.service.list_bookings(&user).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].seats, labels(&["A1"]));
    }

    #[tokio::test]
    async fn test_failure_callback_frees_seats() {
        let harness = harness(ChronoDuration::minutes(10));
        let show = seed_show(&harness, &["A1"], 900).await;

        let checkout = harness
            .service
            .create_booking(show.id, UserId::new("user-x"), labels(&["A1"]))
            .await
            .unwrap();
        harness
            .service
            .on_payment_failure(checkout.reservation_id)
            .await
            .unwrap();

        let snapshot = harness.ledger.snapshot(show.id).await.unwrap();
        assert_eq!(snapshot[&SeatLabel::from("A1")], SeatState::Free);

        let late = harness
            .service
            .on_payment_success(checkout.reservation_id, None)
            .await;
        assert!(matches!(late, Err(CoreError::Stale)));
    }

    #[tokio::test]
    async fn test_success_after_expiry_creates_no_booking() {
        let harness = harness(ChronoDuration::zero());
        let show = seed_show(&harness, &["A1"], 900).await;
        let user = UserId::new("user-x");

        let checkout = harness
            .service
            .create_booking(show.id, user.clone(), labels(&["A1"]))
            .await
            .unwrap();

        let result = harness
            .service
            .on_payment_success(checkout.reservation_id, None)
            .await;
        assert!(matches!(result, Err(CoreError::Expired)));

        assert!(harness.service.list_bookings(&user).await.unwrap().is_empty());
        let snapshot = harness.ledger.snapshot(show.id).await.unwrap();
        assert_eq!(snapshot[&SeatLabel::from("A1")], SeatState::Free);
    }

    /// Booking repository that fails its first reads, for the retry path.
    struct FlakyBookings {
        inner: MemoryStore,
        failures: AtomicU32,
    }

    #[async_trait]
    impl BookingRepository for FlakyBookings {
        async fn insert(&self, booking: &Booking) -> CoreResult<()> {
            BookingRepository::insert(&self.inner, booking).await
        }

        async fn find_by_reservation(&self, id: ReservationId) -> CoreResult<Option<Booking>> {
            self.inner.find_by_reservation(id).await
        }

        async fn list_for_user(&self, user_id: &UserId) -> CoreResult<Vec<Booking>> {
            if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n > 0).then(|| n - 1)
            }).is_ok()
            {
                return Err(CoreError::Store("connection reset".to_string()));
            }
            self.inner.list_for_user(user_id).await
        }
    }

    #[tokio::test]
    async fn test_list_bookings_retries_flaky_reads() {
        let flaky = Arc::new(FlakyBookings {
            inner: MemoryStore::new(),
            failures: AtomicU32::new(2),
        });
        let harness = harness_with(flaky, ChronoDuration::minutes(10));
        let show = seed_show(&harness, &["A1"], 900).await;
        let user = UserId::new("user-x");

        let checkout = harness
            .service
            .create_booking(show.id, user.clone(), labels(&["A1"]))
            .await
            .unwrap();
        harness
            .service
            .on_payment_success(checkout.reservation_id, None)
            .await
            .unwrap();

        // Two transient failures, then the read lands.
        let mine = harness.service.list_bookings(&user).await.unwrap();
        assert_eq!(mine.len(), 1);
    }
}
