//! Polling + push refresh driver
//!
//! Every observer polls the persisted collection on a fixed interval and,
//! when the backend offers a change channel, refreshes immediately on each
//! notification as well. Polling keeps running as the fallback for missed
//! notifications.

use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{broadcast, broadcast::error::RecvError, watch},
    time::interval,
};
use tracing::{debug, info, warn};

use super::shutdown_requested;
use crate::{
    persistence::ChangeNotification,
    state::{StoreError, TimerStore},
};

/// Poll cadence for control surfaces
pub const CONTROL_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Poll cadence for the read-only projection
pub const PROJECTION_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Background task that keeps a store's cache converged with persistence
pub async fn refresh_driver_task(store: Arc<TimerStore>, poll: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut changes = store.persistence().subscribe_changes();
    match changes {
        Some(_) => info!(
            "Starting refresh driver: polling {} storage every {:?} plus change notifications",
            store.persistence().name(),
            poll
        ),
        None => info!(
            "Starting refresh driver: polling {} storage every {:?} (no change notifications)",
            store.persistence().name(),
            poll
        ),
    }

    let mut interval = interval(poll);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                refresh(&store, "poll").await;
            }
            notification = next_change(&mut changes) => match notification {
                Ok(notification) => {
                    debug!("Change notification {:?} on {}", notification.event, notification.table);
                    refresh(&store, "notification").await;
                }
                Err(RecvError::Lagged(missed)) => {
                    debug!("Missed {} change notifications, refreshing", missed);
                    refresh(&store, "notification").await;
                }
                Err(RecvError::Closed) => {
                    let err = StoreError::NotificationChannel("change stream closed".to_string());
                    warn!("{}, falling back to polling", err);
                    changes = None;
                }
            },
            _ = shutdown_requested(&mut shutdown) => {
                debug!("Refresh driver received shutdown");
                break;
            }
        }
    }
}

async fn next_change(
    changes: &mut Option<broadcast::Receiver<ChangeNotification>>,
) -> Result<ChangeNotification, RecvError> {
    match changes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn refresh(store: &TimerStore, trigger: &str) {
    match store.refresh().await {
        Ok(true) => debug!("Refresh ({}) applied new state", trigger),
        Ok(false) => {}
        // Already logged by the store; keep serving the last known state
        Err(e) => debug!("Refresh ({}) failed: {}", trigger, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    use crate::{
        persistence::{LocalBlobStore, MemoryStore, TimerPersistence},
        state::{StoreConfig, TimerStatus},
        tasks::SyncDrivers,
    };

    fn store(persistence: Arc<dyn TimerPersistence>) -> Arc<TimerStore> {
        Arc::new(TimerStore::new(persistence, StoreConfig::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn notification_refreshes_before_next_poll() {
        let backend = Arc::new(MemoryStore::new());
        let control = store(backend.clone());
        let projection = store(backend.clone());

        let mut drivers = SyncDrivers::new();
        drivers.start_refresh(Arc::clone(&projection), Duration::from_secs(60)).await;
        // Let the immediate first poll run
        sleep(Duration::from_millis(10)).await;

        let timer = control.create("Speech", 90).await.unwrap();
        sleep(Duration::from_millis(10)).await;

        assert_eq!(projection.list_all().len(), 1);
        assert_eq!(projection.get(&timer.id).unwrap().status, TimerStatus::Paused);

        drivers.shutdown().await;
    }

    #[tokio::test]
    async fn polling_alone_converges() {
        let dir = tempfile::tempdir().unwrap();
        let control = store(Arc::new(LocalBlobStore::new(dir.path())));
        let projection = store(Arc::new(LocalBlobStore::new(dir.path())));

        let mut drivers = SyncDrivers::new();
        drivers.start_refresh(Arc::clone(&projection), Duration::from_millis(50)).await;
        assert!(drivers.is_refreshing());

        let timer = control.create("Speech", 90).await.unwrap();
        control.start(&timer.id).await.unwrap();

        let mut rx = projection.subscribe();
        let converged = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if rx.borrow_and_update().iter().any(|t| t.status == TimerStatus::Running) {
                    break;
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await;

        assert!(converged.is_ok());
        drivers.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn outage_keeps_last_known_state() {
        let backend = Arc::new(MemoryStore::new());
        let projection = store(backend.clone());

        let mut drivers = SyncDrivers::new();
        drivers.start_refresh(Arc::clone(&projection), Duration::from_millis(500)).await;

        backend
            .upsert(crate::state::TimerRecord::new("Speech", 90).unwrap().into())
            .await
            .unwrap();
        sleep(Duration::from_millis(600)).await;
        assert_eq!(projection.list_all().len(), 1);

        backend.set_available(false);
        sleep(Duration::from_secs(3)).await;
        assert_eq!(projection.list_all().len(), 1);
        assert!(drivers.is_refreshing());

        drivers.shutdown().await;
    }
}
