//! Read-only projection of the timer collection

use std::fmt;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio::sync::watch;

use super::TimerCard;
use crate::state::TimerRecord;

/// Full-screen audience view.
///
/// Holds only a snapshot receiver, so it has no way to mutate timers.
#[derive(Debug, Clone)]
pub struct ProjectionView {
    snapshot: watch::Receiver<Vec<TimerRecord>>,
}

impl ProjectionView {
    pub fn new(snapshot: watch::Receiver<Vec<TimerRecord>>) -> Self {
        Self { snapshot }
    }

    /// Current timers in creation order
    pub fn timers(&self) -> Vec<TimerRecord> {
        self.snapshot.borrow().clone()
    }

    pub fn render(&self) -> ProjectionScreen {
        ProjectionScreen {
            generated_at: Utc::now(),
            timers: self.snapshot.borrow().iter().map(TimerCard::render).collect(),
        }
    }

    /// Wait for the next published snapshot. `false` once the store is gone.
    pub async fn changed(&mut self) -> bool {
        self.snapshot.changed().await.is_ok()
    }
}

/// One rendered frame of the projection
#[derive(Debug, Clone, Serialize)]
pub struct ProjectionScreen {
    pub generated_at: DateTime<Utc>,
    pub timers: Vec<TimerCard>,
}

impl fmt::Display for ProjectionScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let local: DateTime<Local> = self.generated_at.into();
        writeln!(f, "== Timers == {}", local.format("%H:%M:%S"))?;

        if self.timers.is_empty() {
            return writeln!(f, "No active timers");
        }
        for card in &self.timers {
            writeln!(f, "{}", card)?;
        }
        Ok(())
    }
}
