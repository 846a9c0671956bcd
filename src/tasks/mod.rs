//! Background tasks module
//!
//! The tick and refresh drivers that keep a store moving and converged,
//! and the terminal projection feed.

pub mod driver;
pub mod projection_feed;
pub mod refresh_driver;
pub mod tick_driver;

// Re-export main functions
pub use driver::{shutdown_requested, DriverHandle, SyncDrivers};
pub use projection_feed::{projection_feed_task, CLOCK_INTERVAL};
pub use refresh_driver::{refresh_driver_task, CONTROL_POLL_INTERVAL, PROJECTION_POLL_INTERVAL};
pub use tick_driver::{tick_driver_task, TICK_INTERVAL};
