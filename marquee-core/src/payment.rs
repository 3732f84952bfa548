use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_shared::ReservationId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
}

/// A payment session opened with the gateway, keyed by the reservation it
/// pays for. The client completes payment out of band; the gateway reports
/// the terminal outcome through the webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Provider's session handle (e.g. cs_123).
    pub handle: String,
    pub reservation_id: ReservationId,
    pub amount: i64,
    pub currency: String,
    /// Hosted checkout link for the client, when the provider issues one.
    pub checkout_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Gateway seam. The ledger never waits on this: sessions are created after
/// the hold commits, and callbacks are routed back through the reservation
/// engine with exactly-once effect.
#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    async fn create_session(
        &self,
        reservation_id: ReservationId,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentSession, Box<dyn std::error::Error + Send + Sync>>;
}
