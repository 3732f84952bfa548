pub mod events;
pub mod ids;

pub use ids::{BookingId, MovieId, ReservationId, SeatLabel, ShowId, UserId};
