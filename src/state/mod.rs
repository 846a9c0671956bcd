//! State management module
//!
//! The timer record model, the store that owns the canonical collection,
//! and the application state handed to the HTTP layer.

pub mod app_state;
pub mod error;
pub mod timer_record;
pub mod timer_store;

// Re-export main types
pub use app_state::AppState;
pub use error::{StoreError, StoreResult};
pub use timer_record::{validate_duration, validate_name, FinishPolicy, TimerRecord, TimerStatus};
pub use timer_store::{StoreConfig, TickOutcome, TimerStore, DEFAULT_REMOTE_TICK_GUARD};
