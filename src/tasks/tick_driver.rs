//! Per-second countdown driver

use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, time::interval};
use tracing::{debug, info, warn};

use super::shutdown_requested;
use crate::state::TimerStore;

/// Tick cadence
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Background task that advances running timers once per second
pub async fn tick_driver_task(store: Arc<TimerStore>, mut shutdown: watch::Receiver<bool>) {
    info!(
        "Starting tick driver ({:?} finish policy)",
        store.config().finish_policy
    );

    let mut interval = interval(TICK_INTERVAL);
    // The first tick completes immediately; the first decrement is one second out.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let outcome = store.tick().await;
                if outcome.failed > 0 {
                    warn!("Tick could not persist {} timer(s); they stay at their last value", outcome.failed);
                } else if outcome.advanced > 0 {
                    debug!("Tick advanced {} timer(s), {} finished", outcome.advanced, outcome.finished);
                }
            }
            _ = shutdown_requested(&mut shutdown) => {
                debug!("Tick driver received shutdown");
                break;
            }
        }
    }
}
