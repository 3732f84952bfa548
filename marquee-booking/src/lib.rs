pub mod engine;
pub mod payment;
pub mod service;

pub use engine::ReservationEngine;
pub use payment::MockPaymentAdapter;
pub use service::{BookingService, CheckoutSession};
