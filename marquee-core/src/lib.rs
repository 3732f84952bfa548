pub mod booking;
pub mod catalog;
pub mod error;
pub mod ledger;
pub mod payment;
pub mod repository;
pub mod reservation;
pub mod show;

pub use booking::Booking;
pub use error::{CoreError, CoreResult};
pub use ledger::{HoldOutcome, SeatLedger, SeatSlot, SeatState};
pub use reservation::{Reservation, ReservationStatus};
pub use show::ShowInstance;
