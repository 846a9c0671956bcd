//! The canonical timer collection
//!
//! `TimerStore` is constructed once per process and handed to whatever needs
//! it (control surface, projection feed, drivers) behind an `Arc`.
//!
//! Every mutation is written to persistence before it touches the cache; a
//! failed write leaves the cache as it was. The cache lock is held across the
//! write, so mutations, ticks and refreshes within one process never
//! interleave. Across processes writes are last-writer-wins per record.

use std::{
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{
    sync::{watch, Mutex},
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::persistence::{with_retry, RetryPolicy, TimerPersistence, TimerRow};
use super::{
    timer_record::{validate_duration, validate_name},
    FinishPolicy, StoreError, StoreResult, TimerRecord, TimerStatus,
};

/// A remote change observed within this window suppresses local ticking
pub const DEFAULT_REMOTE_TICK_GUARD: Duration = Duration::from_millis(500);

/// Store behavior knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub finish_policy: FinishPolicy,
    pub remote_tick_guard: Duration,
    pub retry: RetryPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            finish_policy: FinishPolicy::default(),
            remote_tick_guard: DEFAULT_REMOTE_TICK_GUARD,
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickOutcome {
    /// Records decremented and persisted
    pub advanced: usize,
    /// Of those, records that switched to `finished`
    pub finished: usize,
    /// Records whose decrement could not be persisted
    pub failed: usize,
    /// The whole tick was skipped by the remote guard
    pub skipped: bool,
}

impl TickOutcome {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct SyncMarks {
    last_refresh: Option<DateTime<Utc>>,
    last_tick: Option<DateTime<Utc>>,
    last_remote_change: Option<Instant>,
}

/// Holds the timer set, applies transitions, and publishes snapshots
pub struct TimerStore {
    persistence: Arc<dyn TimerPersistence>,
    config: StoreConfig,
    timers: Mutex<Vec<TimerRecord>>,
    snapshot_tx: watch::Sender<Vec<TimerRecord>>,
    marks: StdMutex<SyncMarks>,
}

impl std::fmt::Debug for TimerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerStore")
            .field("persistence", &self.persistence.name())
            .field("config", &self.config)
            .field("timers", &self.snapshot_tx.borrow().len())
            .finish_non_exhaustive()
    }
}

impl TimerStore {
    /// Create an empty store; call [`TimerStore::refresh`] to load persisted timers
    pub fn new(persistence: Arc<dyn TimerPersistence>, config: StoreConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(Vec::new());

        Self {
            persistence,
            config,
            timers: Mutex::new(Vec::new()),
            snapshot_tx,
            marks: StdMutex::new(SyncMarks::default()),
        }
    }

    /// Create a store and load the persisted collection into it
    pub async fn load(persistence: Arc<dyn TimerPersistence>, config: StoreConfig) -> StoreResult<Self> {
        let store = Self::new(persistence, config);
        store.refresh().await?;
        Ok(store)
    }

    pub fn persistence(&self) -> &Arc<dyn TimerPersistence> {
        &self.persistence
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Snapshot of all timers in creation order
    pub fn list_all(&self) -> Vec<TimerRecord> {
        self.snapshot_tx.borrow().clone()
    }

    pub fn get(&self, id: &str) -> Option<TimerRecord> {
        self.snapshot_tx.borrow().iter().find(|t| t.id == id).cloned()
    }

    /// Observe every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Vec<TimerRecord>> {
        self.snapshot_tx.subscribe()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.marks().last_refresh
    }

    pub fn last_tick(&self) -> Option<DateTime<Utc>> {
        self.marks().last_tick
    }

    // ── Mutations ───────────────────────────────────────────────────────────

    /// Add a new paused timer
    pub async fn create(&self, name: &str, total_seconds: i64) -> StoreResult<TimerRecord> {
        let record = TimerRecord::new(name, total_seconds)?;
        let mut timers = self.timers.lock().await;

        let persistence = Arc::clone(&self.persistence);
        let row = TimerRow::from(record);
        let stored: TimerRecord = with_retry(self.config.retry, "upsert", move || {
            let persistence = Arc::clone(&persistence);
            let row = row.clone();
            async move { persistence.upsert(row).await }
        })
        .await
        .map_err(|e| {
            warn!("Failed to persist new timer: {}", e);
            StoreError::from(e)
        })?
        .into();

        timers.push(stored.clone());
        sort_by_creation(&mut timers);
        self.publish(&timers);

        info!("Created timer {} ({}) for {}s", stored.name, stored.id, stored.total_seconds);
        Ok(stored)
    }

    pub async fn start(&self, id: &str) -> StoreResult<TimerRecord> {
        self.mutate("start", id, |t| Ok(t.started())).await
    }

    pub async fn pause(&self, id: &str) -> StoreResult<TimerRecord> {
        self.mutate("pause", id, |t| Ok(t.paused())).await
    }

    pub async fn reset(&self, id: &str) -> StoreResult<TimerRecord> {
        self.mutate("reset", id, |t| Ok(t.reset())).await
    }

    /// Reset to a new duration
    pub async fn set_duration(&self, id: &str, total_seconds: i64) -> StoreResult<TimerRecord> {
        validate_duration(total_seconds)?;
        self.mutate("set_duration", id, |t| t.with_duration(total_seconds)).await
    }

    pub async fn rename(&self, id: &str, name: &str) -> StoreResult<TimerRecord> {
        validate_name(name)?;
        self.mutate("rename", id, |t| t.renamed(name)).await
    }

    /// Delete a timer. Unknown ids are ignored and return `false`.
    pub async fn remove(&self, id: &str) -> StoreResult<bool> {
        let mut timers = self.timers.lock().await;

        let persistence = Arc::clone(&self.persistence);
        let target = id.to_string();
        with_retry(self.config.retry, "delete", move || {
            let persistence = Arc::clone(&persistence);
            let target = target.clone();
            async move { persistence.delete(&target).await }
        })
        .await
        .map_err(|e| {
            warn!("Failed to delete timer {}: {}", id, e);
            StoreError::from(e)
        })?;

        let before = timers.len();
        timers.retain(|t| t.id != id);
        let removed = timers.len() != before;

        if removed {
            self.publish(&timers);
            info!("Removed timer {}", id);
        } else {
            debug!("Remove of unknown timer {} ignored", id);
        }
        Ok(removed)
    }

    async fn mutate<F>(&self, action: &str, id: &str, transition: F) -> StoreResult<TimerRecord>
    where
        F: FnOnce(&TimerRecord) -> StoreResult<Option<TimerRecord>>,
    {
        let mut timers = self.timers.lock().await;
        let current = timers
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let Some(candidate) = transition(&current)? else {
            debug!("{} on timer {} changed nothing", action, id);
            return Ok(current);
        };

        match self.persist_existing(candidate).await {
            Ok(Some(stored)) => {
                replace(&mut timers, stored.clone());
                self.publish(&timers);
                info!(
                    "Timer {} ({}) {}: {} with {}s remaining",
                    stored.name, id, action, stored.status, stored.remaining_seconds
                );
                Ok(stored)
            }
            Ok(None) => {
                warn!("Timer {} was removed elsewhere, dropping it", id);
                timers.retain(|t| t.id != id);
                self.publish(&timers);
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => {
                warn!("Failed to persist {} for timer {}: {}", action, id, e);
                Err(e)
            }
        }
    }

    async fn persist_existing(&self, record: TimerRecord) -> StoreResult<Option<TimerRecord>> {
        let persistence = Arc::clone(&self.persistence);
        let row = TimerRow::from(record);
        let stored = with_retry(self.config.retry, "update", move || {
            let persistence = Arc::clone(&persistence);
            let row = row.clone();
            async move { persistence.update(row).await }
        })
        .await?;

        Ok(stored.map(TimerRecord::from))
    }

    // ── Tick ────────────────────────────────────────────────────────────────

    /// Advance every running timer by one second.
    ///
    /// With remote persistence the tick is skipped while a remote change was
    /// seen within `remote_tick_guard`; another instance is ticking then.
    pub async fn tick(&self) -> TickOutcome {
        if self.persistence.is_remote() && self.remote_change_within(self.config.remote_tick_guard) {
            debug!(
                "Skipping local tick, remote change seen within {:?}",
                self.config.remote_tick_guard
            );
            return TickOutcome::skipped();
        }

        let mut timers = self.timers.lock().await;
        let candidates: Vec<TimerRecord> = timers
            .iter()
            .filter_map(|t| t.advanced(self.config.finish_policy))
            .collect();

        let mut outcome = TickOutcome::default();
        let mut changed = false;

        for candidate in candidates {
            let id = candidate.id.clone();
            match self.persist_existing(candidate).await {
                Ok(Some(stored)) => {
                    if stored.status == TimerStatus::Finished {
                        outcome.finished += 1;
                        info!("Timer {} ({}) finished", stored.name, id);
                    }
                    outcome.advanced += 1;
                    replace(&mut timers, stored);
                    changed = true;
                }
                Ok(None) => {
                    debug!("Timer {} vanished during tick, dropping it", id);
                    timers.retain(|t| t.id != id);
                    changed = true;
                }
                Err(e) => {
                    warn!("Failed to persist tick for timer {}: {}", id, e);
                    outcome.failed += 1;
                }
            }
        }

        if changed {
            self.publish(&timers);
        }
        drop(timers);

        if let Ok(mut marks) = self.marks.lock() {
            marks.last_tick = Some(Utc::now());
        }
        outcome
    }

    // ── Refresh ─────────────────────────────────────────────────────────────

    /// Replace the cache with the persisted collection.
    ///
    /// Returns whether anything changed. On failure the cache is kept and the
    /// store keeps serving the last known state.
    pub async fn refresh(&self) -> StoreResult<bool> {
        let mut timers = self.timers.lock().await;

        let persistence = Arc::clone(&self.persistence);
        let rows = with_retry(self.config.retry, "list_all", move || {
            let persistence = Arc::clone(&persistence);
            async move { persistence.list_all().await }
        })
        .await
        .map_err(|e| {
            warn!(
                "Refresh from {} storage failed, keeping last known state: {}",
                self.persistence.name(),
                e
            );
            StoreError::from(e)
        })?;

        let mut fresh: Vec<TimerRecord> = rows.into_iter().map(TimerRecord::from).collect();
        sort_by_creation(&mut fresh);

        let changed = *timers != fresh;
        if let Ok(mut marks) = self.marks.lock() {
            marks.last_refresh = Some(Utc::now());
            if changed {
                marks.last_remote_change = Some(Instant::now());
            }
        }

        if !changed {
            return Ok(false);
        }

        debug!("Refresh replaced {} cached timers with {}", timers.len(), fresh.len());
        *timers = fresh;
        self.publish(&timers);
        Ok(true)
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn publish(&self, timers: &[TimerRecord]) {
        self.snapshot_tx.send_replace(timers.to_vec());
    }

    fn marks(&self) -> SyncMarks {
        self.marks.lock().map(|m| *m).unwrap_or_default()
    }

    fn remote_change_within(&self, window: Duration) -> bool {
        self.marks()
            .last_remote_change
            .map(|at| at.elapsed() < window)
            .unwrap_or(false)
    }
}

fn replace(timers: &mut [TimerRecord], record: TimerRecord) {
    if let Some(slot) = timers.iter_mut().find(|t| t.id == record.id) {
        *slot = record;
    }
}

fn sort_by_creation(timers: &mut [TimerRecord]) {
    timers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}
