use std::sync::Arc;

use marquee_booking::ReservationEngine;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

/// Background expiry sweep. Holds no state of its own: each pass goes
/// through the engine's conditional transitions, so it composes safely with
/// in-flight confirm/cancel calls and with a second sweeper instance.
pub fn spawn_sweeper(engine: Arc<ReservationEngine>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("expiry sweeper started, interval {:?}", interval);
        loop {
            sleep(interval).await;
            match engine.sweep_expired().await {
                Ok(0) => {}
                Ok(count) => info!(count, "sweeper released expired holds"),
                Err(e) => error!("expiry sweep failed: {}", e),
            }
        }
    })
}
