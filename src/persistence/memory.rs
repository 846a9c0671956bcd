//! Shared in-process table with change notifications

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard,
};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;

use super::{
    ChangeEvent, ChangeNotification, PersistenceError, PersistenceResult, TimerPersistence, TimerRow,
};

/// Table of timer rows that pushes a notification on every change.
///
/// Plays the part of a hosted relational store: several `TimerStore`s can
/// hold the same `Arc<MemoryStore>`, and when built with [`MemoryStore::remote`]
/// they treat it as remote and tick with the refresh guard.
#[derive(Debug)]
pub struct MemoryStore {
    rows: Mutex<Vec<TimerRow>>,
    changes_tx: broadcast::Sender<ChangeNotification>,
    remote: bool,
    available: AtomicBool,
}

impl MemoryStore {
    /// Table owned by the local process
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Table shared by replicated instances
    pub fn remote() -> Self {
        Self::build(true)
    }

    fn build(remote: bool) -> Self {
        let (changes_tx, _) = broadcast::channel(100);
        Self {
            rows: Mutex::new(Vec::new()),
            changes_tx,
            remote,
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: every call fails with `Unavailable` while false
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn table(&self) -> PersistenceResult<MutexGuard<'_, Vec<TimerRow>>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("memory store offline".to_string()));
        }
        self.rows
            .lock()
            .map_err(|e| PersistenceError::Backend(format!("Failed to lock timer table: {}", e)))
    }

    fn notify(&self, event: ChangeEvent) {
        // No subscribers is fine: observers fall back to polling.
        if self.changes_tx.send(ChangeNotification::timers(event)).is_err() {
            debug!("No change subscribers for {:?}", event);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TimerPersistence for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_remote(&self) -> bool {
        self.remote
    }

    async fn list_all(&self) -> PersistenceResult<Vec<TimerRow>> {
        Ok(self.table()?.clone())
    }

    async fn upsert(&self, mut row: TimerRow) -> PersistenceResult<TimerRow> {
        let now = Utc::now();
        row.updated_at = Some(now);

        let event = {
            let mut rows = self.table()?;
            match rows.iter_mut().find(|r| r.id == row.id) {
                Some(existing) => {
                    row.created_at = existing.created_at.or(row.created_at);
                    *existing = row.clone();
                    ChangeEvent::Update
                }
                None => {
                    row.created_at = row.created_at.or(Some(now));
                    rows.push(row.clone());
                    ChangeEvent::Insert
                }
            }
        };

        self.notify(event);
        Ok(row)
    }

    async fn update(&self, mut row: TimerRow) -> PersistenceResult<Option<TimerRow>> {
        {
            let mut rows = self.table()?;
            let Some(existing) = rows.iter_mut().find(|r| r.id == row.id) else {
                return Ok(None);
            };
            row.created_at = existing.created_at.or(row.created_at);
            row.updated_at = Some(Utc::now());
            *existing = row.clone();
        }

        self.notify(ChangeEvent::Update);
        Ok(Some(row))
    }

    async fn delete(&self, id: &str) -> PersistenceResult<()> {
        let removed = {
            let mut rows = self.table()?;
            let before = rows.len();
            rows.retain(|r| r.id != id);
            rows.len() != before
        };

        if removed {
            self.notify(ChangeEvent::Delete);
        }
        Ok(())
    }

    fn subscribe_changes(&self) -> Option<broadcast::Receiver<ChangeNotification>> {
        Some(self.changes_tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TimerRecord;

    fn row(name: &str, total: i64) -> TimerRow {
        TimerRecord::new(name, total).unwrap().into()
    }

    #[tokio::test]
    async fn every_change_is_announced() {
        let store = MemoryStore::new();
        let mut changes = store.subscribe_changes().unwrap();

        let stored = store.upsert(row("Speech", 90)).await.unwrap();
        store.update(stored.clone()).await.unwrap();
        store.delete(&stored.id).await.unwrap();

        assert_eq!(changes.recv().await.unwrap().event, ChangeEvent::Insert);
        assert_eq!(changes.recv().await.unwrap().event, ChangeEvent::Update);
        assert_eq!(changes.recv().await.unwrap().event, ChangeEvent::Delete);
    }

    #[tokio::test]
    async fn deleting_an_absent_row_is_silent() {
        let store = MemoryStore::new();
        let mut changes = store.subscribe_changes().unwrap();

        store.delete("ghost").await.unwrap();
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn update_of_removed_row_returns_none() {
        let store = MemoryStore::remote();
        let stored = store.upsert(row("Break", 5)).await.unwrap();
        store.delete(&stored.id).await.unwrap();

        assert!(store.update(stored).await.unwrap().is_none());
        assert!(store.list_all().await.unwrap().is_empty());
        assert!(store.is_remote());
    }

    #[tokio::test]
    async fn outage_fails_every_call() {
        let store = MemoryStore::new();
        store.set_available(false);

        assert!(matches!(store.list_all().await, Err(PersistenceError::Unavailable(_))));
        assert!(store.upsert(row("Speech", 90)).await.is_err());

        store.set_available(true);
        assert!(store.list_all().await.unwrap().is_empty());
    }
}
