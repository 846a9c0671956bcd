//! Multi-observer convergence through shared persistence

use std::{sync::Arc, time::Duration};
use async_trait::async_trait;
use tokio::{
    net::TcpListener,
    time::{sleep, timeout, Instant},
};

use countdown_board::{
    api::create_router,
    persistence::{LocalBlobStore, MemoryStore, PersistenceResult, RemoteStore, TimerPersistence, TimerRow},
    state::{AppState, StoreConfig, TimerStatus, TimerStore},
    tasks::{SyncDrivers, CONTROL_POLL_INTERVAL},
};

fn store(persistence: Arc<dyn TimerPersistence>) -> Arc<TimerStore> {
    Arc::new(TimerStore::new(persistence, StoreConfig::default()))
}

/// A host's table seen the way a `RemoteStore` replica sees it: remote,
/// ticked by the host, and without push notifications.
struct HostedTable(Arc<MemoryStore>);

#[async_trait]
impl TimerPersistence for HostedTable {
    fn name(&self) -> &'static str {
        "hosted"
    }

    fn is_remote(&self) -> bool {
        true
    }

    fn ticks_elsewhere(&self) -> bool {
        true
    }

    async fn list_all(&self) -> PersistenceResult<Vec<TimerRow>> {
        self.0.list_all().await
    }

    async fn upsert(&self, row: TimerRow) -> PersistenceResult<TimerRow> {
        self.0.upsert(row).await
    }

    async fn update(&self, row: TimerRow) -> PersistenceResult<Option<TimerRow>> {
        self.0.update(row).await
    }

    async fn delete(&self, id: &str) -> PersistenceResult<()> {
        self.0.delete(id).await
    }
}

#[tokio::test(start_paused = true)]
async fn replica_never_speeds_up_the_host_countdown() {
    let backend = Arc::new(MemoryStore::new());
    let host = store(backend.clone());
    let replica = store(Arc::new(HostedTable(backend.clone())));

    let timer = host.create("Speech", 90).await.unwrap();
    host.start(&timer.id).await.unwrap();

    let mut host_drivers = SyncDrivers::new();
    host_drivers.start(Arc::clone(&host), CONTROL_POLL_INTERVAL).await;
    assert!(host_drivers.is_ticking());

    // Out of phase with the host on purpose
    sleep(Duration::from_millis(100)).await;
    let mut replica_drivers = SyncDrivers::new();
    replica_drivers.start(Arc::clone(&replica), CONTROL_POLL_INTERVAL).await;
    assert!(!replica_drivers.is_ticking());
    assert!(replica_drivers.is_refreshing());

    sleep(Duration::from_millis(10_400)).await;

    assert_eq!(backend.list_all().await.unwrap()[0].remaining_seconds, 80);
    assert_eq!(host.get(&timer.id).unwrap().remaining_seconds, 80);
    assert_eq!(replica.get(&timer.id).unwrap().remaining_seconds, 80);

    host_drivers.shutdown().await;
    replica_drivers.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remote_replica_refreshes_on_host_push() {
    let host = store(Arc::new(MemoryStore::new()));
    let state = Arc::new(AppState::new(Arc::clone(&host), 0, "127.0.0.1".to_string()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });

    let replica = store(Arc::new(RemoteStore::new(format!("http://{}", addr))));
    let mut drivers = SyncDrivers::new();
    // Long enough that only a push can explain the refresh
    drivers.start(Arc::clone(&replica), Duration::from_secs(60)).await;
    assert!(!drivers.is_ticking());

    // Initial poll plus the stream connecting
    sleep(Duration::from_millis(500)).await;
    assert!(replica.list_all().is_empty());

    let timer = host.create("Speech", 90).await.unwrap();

    let mut rx = replica.subscribe();
    let seen = timeout(Duration::from_secs(5), async {
        loop {
            let present = rx.borrow_and_update().iter().any(|t| t.id == timer.id);
            if present || rx.changed().await.is_err() {
                return present;
            }
        }
    })
    .await;

    assert_eq!(seen, Ok(true));
    drivers.shutdown().await;
}

#[tokio::test]
async fn start_reaches_polling_observer_within_one_interval() {
    let dir = tempfile::tempdir().unwrap();
    let control = store(Arc::new(LocalBlobStore::new(dir.path())));
    let observer = store(Arc::new(LocalBlobStore::new(dir.path())));

    let timer = control.create("Speech", 90).await.unwrap();

    let mut drivers = SyncDrivers::new();
    drivers.start_refresh(Arc::clone(&observer), CONTROL_POLL_INTERVAL).await;

    let mut rx = observer.subscribe();
    let started_at = Instant::now();
    control.start(&timer.id).await.unwrap();

    let seen = timeout(CONTROL_POLL_INTERVAL + Duration::from_millis(300), async {
        loop {
            let running = rx
                .borrow_and_update()
                .iter()
                .any(|t| t.id == timer.id && t.status == TimerStatus::Running);
            if running || rx.changed().await.is_err() {
                return running;
            }
        }
    })
    .await;

    assert_eq!(seen, Ok(true), "observer missed the start after {:?}", started_at.elapsed());
    drivers.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn projection_follows_host_ticks() {
    let backend = Arc::new(MemoryStore::new());
    let host = store(backend.clone());
    let projection = store(backend.clone());

    let timer = host.create("Speech", 90).await.unwrap();
    host.start(&timer.id).await.unwrap();

    let mut host_drivers = SyncDrivers::new();
    host_drivers.start_tick(Arc::clone(&host)).await;
    let mut projection_drivers = SyncDrivers::new();
    projection_drivers.start_refresh(Arc::clone(&projection), Duration::from_secs(2)).await;

    sleep(Duration::from_millis(3500)).await;

    assert_eq!(host.get(&timer.id).unwrap().remaining_seconds, 87);
    assert_eq!(projection.get(&timer.id).unwrap().remaining_seconds, 87);

    host_drivers.shutdown().await;
    projection_drivers.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn pause_from_second_control_stops_the_host() {
    let backend = Arc::new(MemoryStore::new());
    let host = store(backend.clone());
    let second = store(backend.clone());

    let timer = host.create("Break", 10).await.unwrap();
    host.start(&timer.id).await.unwrap();

    let mut host_drivers = SyncDrivers::new();
    host_drivers.start_tick(Arc::clone(&host)).await;
    host_drivers.start_refresh(Arc::clone(&host), CONTROL_POLL_INTERVAL).await;

    sleep(Duration::from_millis(2500)).await;
    second.refresh().await.unwrap();
    let paused = second.pause(&timer.id).await.unwrap();
    assert_eq!(paused.status, TimerStatus::Paused);
    assert_eq!(paused.remaining_seconds, 8);

    sleep(Duration::from_secs(3)).await;
    let on_host = host.get(&timer.id).unwrap();
    assert_eq!(on_host.status, TimerStatus::Paused);
    assert_eq!(on_host.remaining_seconds, 8);

    host_drivers.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn removal_elsewhere_is_not_resurrected_by_ticks() {
    let backend = Arc::new(MemoryStore::new());
    let host = store(backend.clone());
    let second = store(backend.clone());

    let timer = host.create("Speech", 90).await.unwrap();
    host.start(&timer.id).await.unwrap();

    let mut host_drivers = SyncDrivers::new();
    host_drivers.start_tick(Arc::clone(&host)).await;

    second.refresh().await.unwrap();
    assert!(second.remove(&timer.id).await.unwrap());

    sleep(Duration::from_millis(2500)).await;

    assert!(backend.list_all().await.unwrap().is_empty());
    assert!(host.get(&timer.id).is_none());

    host_drivers.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn strict_finish_propagates_to_observers() {
    let backend = Arc::new(MemoryStore::new());
    let host = store(backend.clone());
    let projection = store(backend.clone());

    let timer = host.create("Break", 2).await.unwrap();
    host.start(&timer.id).await.unwrap();

    let mut host_drivers = SyncDrivers::new();
    host_drivers.start_tick(Arc::clone(&host)).await;
    let mut projection_drivers = SyncDrivers::new();
    projection_drivers.start_refresh(Arc::clone(&projection), Duration::from_secs(2)).await;

    sleep(Duration::from_millis(4500)).await;

    let seen = projection.get(&timer.id).unwrap();
    assert_eq!(seen.status, TimerStatus::Finished);
    assert_eq!(seen.remaining_seconds, 0);

    host_drivers.shutdown().await;
    projection_drivers.shutdown().await;
}
