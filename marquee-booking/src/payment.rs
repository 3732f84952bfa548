use async_trait::async_trait;
use chrono::Utc;
use marquee_core::payment::{PaymentAdapter, PaymentSession};
use marquee_shared::ReservationId;

/// Mock payment gateway for development and testing. Opens a session for any
/// amount; the terminal callback is driven by the test or by hand through
/// the webhook route.
pub struct MockPaymentAdapter;

#[async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    async fn create_session(
        &self,
        reservation_id: ReservationId,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentSession, Box<dyn std::error::Error + Send + Sync>> {
        // Encode the reservation in the handle so the mock stays stateless.
        let handle = format!("mock_cs_{}", reservation_id.as_uuid().simple());
        Ok(PaymentSession {
            checkout_url: Some(format!("https://payments.example/checkout/{handle}")),
            handle,
            reservation_id,
            amount,
            currency: currency.to_string(),
            created_at: Utc::now(),
        })
    }
}
