//! Cancellable handles for background driver loops

use std::{future::Future, sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use super::{refresh_driver_task, tick_driver_task};
use crate::state::TimerStore;

/// A spawned driver loop.
///
/// `cancel` stops it and waits for it to exit; dropping the handle aborts it.
#[derive(Debug)]
pub struct DriverHandle {
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl DriverHandle {
    /// Spawn `driver`, handing it the shutdown signal to watch
    pub fn spawn<F, Fut>(name: &'static str, driver: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(driver(shutdown_rx));
        debug!("Spawned {} driver", name);

        Self {
            name,
            shutdown_tx,
            task: Some(task),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }

    /// Signal shutdown and wait for the loop to exit
    pub async fn cancel(mut self) {
        // Err only means the loop already exited
        let _ = self.shutdown_tx.send(true);

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("{} driver ended abnormally: {}", self.name, e);
                }
            }
        }
        info!("{} driver stopped", self.name);
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Resolves once shutdown is signalled or the handle is gone
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// The tick and refresh drivers of one store.
///
/// At most one of each runs; starting a driver cancels its predecessor first.
#[derive(Debug, Default)]
pub struct SyncDrivers {
    tick: Option<DriverHandle>,
    refresh: Option<DriverHandle>,
}

impl SyncDrivers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the drivers this store's storage calls for.
    ///
    /// Refresh always runs. Ticking runs unless the storage is fronted by a
    /// host that ticks the same rows itself.
    pub async fn start(&mut self, store: Arc<TimerStore>, poll: Duration) {
        if store.persistence().ticks_elsewhere() {
            info!(
                "{} storage is ticked by its host, running refresh only",
                store.persistence().name()
            );
            if let Some(previous) = self.tick.take() {
                previous.cancel().await;
            }
        } else {
            self.start_tick(Arc::clone(&store)).await;
        }
        self.start_refresh(store, poll).await;
    }

    /// (Re)start the per-second tick driver
    pub async fn start_tick(&mut self, store: Arc<TimerStore>) {
        if let Some(previous) = self.tick.take() {
            previous.cancel().await;
        }
        self.tick = Some(DriverHandle::spawn("tick", move |shutdown| {
            tick_driver_task(store, shutdown)
        }));
    }

    /// (Re)start the refresh driver polling every `poll`
    pub async fn start_refresh(&mut self, store: Arc<TimerStore>, poll: Duration) {
        if let Some(previous) = self.refresh.take() {
            previous.cancel().await;
        }
        self.refresh = Some(DriverHandle::spawn("refresh", move |shutdown| {
            refresh_driver_task(store, poll, shutdown)
        }));
    }

    pub fn is_ticking(&self) -> bool {
        self.tick.as_ref().map(|d| !d.is_finished()).unwrap_or(false)
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh.as_ref().map(|d| !d.is_finished()).unwrap_or(false)
    }

    /// Cancel both drivers and wait for them
    pub async fn shutdown(&mut self) {
        if let Some(tick) = self.tick.take() {
            tick.cancel().await;
        }
        if let Some(refresh) = self.refresh.take() {
            refresh.cancel().await;
        }
    }
}
