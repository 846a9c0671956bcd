//! Persistence layer
//!
//! The timer store only talks to storage through [`TimerPersistence`].
//! Adapters exchange [`TimerRow`]s; translation to the in-memory
//! [`TimerRecord`](crate::state::TimerRecord) happens at this boundary.

mod error;
mod local;
mod memory;
mod models;
mod remote;
mod retry;

use async_trait::async_trait;
use tokio::sync::broadcast;

pub use error::{PersistenceError, PersistenceResult};
pub use local::{LocalBlobStore, TIMERS_KEY};
pub use memory::MemoryStore;
pub use models::{ChangeEvent, ChangeNotification, TimerRow, TIMERS_TABLE};
pub use remote::RemoteStore;
pub use retry::{with_retry, RetryPolicy};

/// Durable storage of timer rows
#[async_trait]
pub trait TimerPersistence: Send + Sync + 'static {
    /// Short backend name for logs and status output
    fn name(&self) -> &'static str;

    /// Whether the rows live outside this process.
    ///
    /// Remote backends switch the store to guarded local ticking.
    fn is_remote(&self) -> bool {
        false
    }

    /// Whether another process already drives the countdown for these rows.
    ///
    /// Instances on such storage never run a tick driver of their own.
    fn ticks_elsewhere(&self) -> bool {
        false
    }

    /// Read every stored row
    async fn list_all(&self) -> PersistenceResult<Vec<TimerRow>>;

    /// Insert or replace a row, returning it as stored
    async fn upsert(&self, row: TimerRow) -> PersistenceResult<TimerRow>;

    /// Replace a row only if it still exists.
    ///
    /// Returns `None` when the id is gone, so a write racing a delete
    /// never brings the record back.
    async fn update(&self, row: TimerRow) -> PersistenceResult<Option<TimerRow>>;

    /// Delete a row. Deleting an absent id succeeds.
    async fn delete(&self, id: &str) -> PersistenceResult<()>;

    /// Push channel for out-of-process changes, if the backend has one
    fn subscribe_changes(&self) -> Option<broadcast::Receiver<ChangeNotification>> {
        None
    }
}
