use std::sync::Arc;

use marquee_booking::{BookingService, ReservationEngine};
use marquee_catalog::ShowRegistry;
use marquee_core::catalog::CatalogAdapter;
use marquee_core::ledger::SeatLedger;
use marquee_shared::events::SeatEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ShowRegistry>,
    pub engine: Arc<ReservationEngine>,
    pub bookings: Arc<BookingService>,
    pub catalog: Arc<dyn CatalogAdapter>,
    pub ledger: Arc<dyn SeatLedger>,
    pub seat_tx: broadcast::Sender<SeatEvent>,
}
