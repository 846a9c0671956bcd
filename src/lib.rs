//! Countdown Board - shared countdown timers for control and projection surfaces
//!
//! A single `TimerStore` owns the timer collection, advances running timers
//! once per second, persists every change, and publishes snapshots. Any
//! number of observers, in this process or others, converge on the persisted
//! state by polling and, where the backend supports it, change notifications.

pub mod config;
pub mod state;
pub mod api;
pub mod persistence;
pub mod tasks;
pub mod utils;
pub mod views;

// Re-export commonly used types
pub use config::Config;
pub use state::{AppState, FinishPolicy, StoreConfig, StoreError, TimerRecord, TimerStatus, TimerStore};
pub use api::create_router;
pub use utils::signals::shutdown_signal;
