//! Client for another instance's record backend (`/records`)

use std::{
    io::{BufRead, BufReader},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{
    ChangeEvent, ChangeNotification, PersistenceError, PersistenceResult, TimerPersistence, TimerRow,
};

/// Pause before reconnecting to a dropped change stream
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Uses a remote host as the durable store.
///
/// The host ticks its own timers, so replicas on this store only refresh.
/// Changes are pushed from the host's `/timers/events` stream once anyone
/// subscribes; polling covers whatever the stream misses.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    base_url: String,
    agent: ureq::Agent,
    changes_tx: broadcast::Sender<ChangeNotification>,
    listening: Arc<AtomicBool>,
}

impl RemoteStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        let (changes_tx, _) = broadcast::channel(100);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::Agent::new_with_defaults(),
            changes_tx,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn records_url(&self) -> String {
        format!("{}/records", self.base_url)
    }

    fn record_url(&self, id: &str) -> String {
        format!("{}/records/{}", self.base_url, id)
    }

    fn events_url(&self) -> String {
        format!("{}/timers/events", self.base_url)
    }

    /// Start following the host's change stream unless already following it
    fn ensure_listener(&self) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let agent = self.agent.clone();
        let url = self.events_url();
        let changes_tx = self.changes_tx.clone();
        let listening = Arc::clone(&self.listening);

        let spawned = thread::Builder::new()
            .name("remote-changes".to_string())
            .spawn(move || {
                follow_events(&agent, &url, &changes_tx);
                listening.store(false, Ordering::SeqCst);
            });

        if let Err(e) = spawned {
            warn!("Failed to start change stream listener: {}, polling only", e);
            self.listening.store(false, Ordering::SeqCst);
        }
    }

    /// Run a blocking HTTP exchange off the async runtime
    async fn blocking<T, F>(&self, call: F) -> PersistenceResult<T>
    where
        T: Send + 'static,
        F: FnOnce(ureq::Agent) -> PersistenceResult<T> + Send + 'static,
    {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || call(agent))
            .await
            .map_err(|e| PersistenceError::Backend(format!("task join error: {}", e)))?
    }
}

fn classify(err: ureq::Error) -> PersistenceError {
    match err {
        ureq::Error::StatusCode(status) if (400..500).contains(&status) => {
            PersistenceError::Rejected(format!("remote store returned HTTP {}", status))
        }
        ureq::Error::StatusCode(status) => {
            PersistenceError::Backend(format!("remote store returned HTTP {}", status))
        }
        other => PersistenceError::Unavailable(other.to_string()),
    }
}

/// Forward every `snapshot` event of the host's SSE stream as a change
/// notification, reconnecting until nobody is subscribed any more.
fn follow_events(agent: &ureq::Agent, url: &str, changes_tx: &broadcast::Sender<ChangeNotification>) {
    info!("Following change stream at {}", url);

    while changes_tx.receiver_count() > 0 {
        match agent.get(url).header("Accept", "text/event-stream").call() {
            Ok(response) => {
                let reader = BufReader::new(response.into_body().into_reader());
                for line in reader.lines() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            debug!("Change stream read failed: {}", e);
                            break;
                        }
                    };
                    if changes_tx.receiver_count() == 0 {
                        break;
                    }
                    if is_snapshot_event(&line) {
                        // Err only means every subscriber is gone
                        let _ = changes_tx.send(ChangeNotification::timers(ChangeEvent::Update));
                    }
                }
                debug!("Change stream at {} ended", url);
            }
            Err(e) => warn!("Change stream at {} unavailable: {}, polling only until it returns", url, e),
        }

        if changes_tx.receiver_count() > 0 {
            thread::sleep(RECONNECT_DELAY);
        }
    }

    info!("Stopped following change stream at {}", url);
}

fn is_snapshot_event(line: &str) -> bool {
    line.strip_prefix("event:")
        .map(|name| name.trim() == "snapshot")
        .unwrap_or(false)
}

fn read_json<T: DeserializeOwned>(response: ureq::http::Response<ureq::Body>) -> PersistenceResult<T> {
    response
        .into_body()
        .read_json()
        .map_err(|e| PersistenceError::Backend(format!("failed to parse response as JSON: {}", e)))
}

#[async_trait]
impl TimerPersistence for RemoteStore {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn is_remote(&self) -> bool {
        true
    }

    fn ticks_elsewhere(&self) -> bool {
        true
    }

    fn subscribe_changes(&self) -> Option<broadcast::Receiver<ChangeNotification>> {
        let changes = self.changes_tx.subscribe();
        self.ensure_listener();
        Some(changes)
    }

    async fn list_all(&self) -> PersistenceResult<Vec<TimerRow>> {
        let url = self.records_url();
        self.blocking(move |agent| {
            let response = agent.get(&url).call().map_err(classify)?;
            read_json(response)
        })
        .await
    }

    async fn upsert(&self, row: TimerRow) -> PersistenceResult<TimerRow> {
        let url = self.record_url(&row.id);
        debug!("PUT {}", url);
        self.blocking(move |agent| {
            let response = agent.put(&url).send_json(&row).map_err(classify)?;
            read_json(response)
        })
        .await
    }

    async fn update(&self, row: TimerRow) -> PersistenceResult<Option<TimerRow>> {
        let url = self.record_url(&row.id);
        debug!("PATCH {}", url);
        self.blocking(move |agent| match agent.patch(&url).send_json(&row) {
            Ok(response) => read_json(response).map(Some),
            Err(ureq::Error::StatusCode(404)) => Ok(None),
            Err(e) => Err(classify(e)),
        })
        .await
    }

    async fn delete(&self, id: &str) -> PersistenceResult<()> {
        let url = self.record_url(id);
        debug!("DELETE {}", url);
        self.blocking(move |agent| match agent.delete(&url).call() {
            Ok(_) | Err(ureq::Error::StatusCode(404)) => Ok(()),
            Err(e) => Err(classify(e)),
        })
        .await
    }
}
