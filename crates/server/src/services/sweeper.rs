//! Background cancellation of bank-transfer orders whose payment window ran out.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, error, info};

use super::order_flow::OrderFlowService;

/// How often expired grace periods are swept.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Spawn the sweeper. It runs until the runtime shuts down.
pub fn spawn_grace_period_sweeper(pool: PgPool) -> tokio::task::JoinHandle<()> {
    info!(interval_secs = SWEEP_INTERVAL.as_secs(), "Spawning grace period sweeper");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep_once(&pool).await;
        }
    })
}

/// One sweep. Failures are logged; the next tick retries.
pub async fn sweep_once(pool: &PgPool) {
    match OrderFlowService::new(pool).expire_grace_periods(Utc::now()).await {
        Ok(0) => debug!("No expired grace periods"),
        Ok(cancelled) => info!(cancelled, "Cancelled orders with expired grace periods"),
        Err(e) => error!(error = %e, "Grace period sweep failed"),
    }
}
