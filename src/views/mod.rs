//! Views over the timer store
//!
//! Both views share the read-only [`TimerCard`] rendering; only
//! [`ControlView`] carries a store handle and can change anything.

pub mod card;
pub mod control;
pub mod form;
pub mod projection;

pub use card::{format_clock, TimerCard};
pub use control::{available_actions, ControlCard, ControlScreen, ControlView, TimerAction};
pub use form::TimerForm;
pub use projection::{ProjectionScreen, ProjectionView};
