//! Timer record structure and its state machine

use std::fmt;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{StoreError, StoreResult};

/// Countdown status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Paused,
    Running,
    Finished,
}

impl TimerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paused => "paused",
            Self::Running => "running",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a running timer does when it reaches zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FinishPolicy {
    /// Stop at zero and switch to `finished`
    #[default]
    Strict,
    /// Keep counting into negative values and stay `running`
    Overrun,
}

/// One countdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    pub id: String,
    pub name: String,
    pub total_seconds: i64,
    pub remaining_seconds: i64,
    pub status: TimerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Trimmed, non-empty timer name
pub fn validate_name(name: &str) -> StoreResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::Validation("timer name must not be empty".to_string()));
    }
    Ok(name.to_string())
}

/// Strictly positive duration in seconds
pub fn validate_duration(total_seconds: i64) -> StoreResult<i64> {
    if total_seconds <= 0 {
        return Err(StoreError::Validation(format!(
            "duration must be positive, got {} seconds",
            total_seconds
        )));
    }
    Ok(total_seconds)
}

impl TimerRecord {
    /// Create a paused timer with the full duration remaining
    pub fn new(name: &str, total_seconds: i64) -> StoreResult<Self> {
        let name = validate_name(name)?;
        let total_seconds = validate_duration(total_seconds)?;
        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            total_seconds,
            remaining_seconds: total_seconds,
            status: TimerStatus::Paused,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    /// Counted past zero (only possible under [`FinishPolicy::Overrun`])
    pub fn is_overrun(&self) -> bool {
        self.remaining_seconds < 0
    }

    /// Same countdown state, ignoring timestamps
    pub fn same_state(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.total_seconds == other.total_seconds
            && self.remaining_seconds == other.remaining_seconds
            && self.status == other.status
    }

    /// Apply `change` to a copy; `None` when it changes nothing
    fn transition<F>(&self, change: F) -> Option<Self>
    where
        F: FnOnce(&mut Self),
    {
        let mut next = self.clone();
        change(&mut next);

        if next.same_state(self) {
            None
        } else {
            next.updated_at = Some(Utc::now());
            Some(next)
        }
    }

    /// `paused -> running`; running and finished timers are left alone
    pub fn started(&self) -> Option<Self> {
        if self.status != TimerStatus::Paused {
            return None;
        }
        self.transition(|t| t.status = TimerStatus::Running)
    }

    /// `running -> paused`
    pub fn paused(&self) -> Option<Self> {
        if self.status != TimerStatus::Running {
            return None;
        }
        self.transition(|t| t.status = TimerStatus::Paused)
    }

    /// Any state back to paused with the full duration remaining
    pub fn reset(&self) -> Option<Self> {
        self.transition(|t| {
            t.remaining_seconds = t.total_seconds;
            t.status = TimerStatus::Paused;
        })
    }

    /// Full reset to a new duration
    pub fn with_duration(&self, total_seconds: i64) -> StoreResult<Option<Self>> {
        let total_seconds = validate_duration(total_seconds)?;
        Ok(self.transition(|t| {
            t.total_seconds = total_seconds;
            t.remaining_seconds = total_seconds;
            t.status = TimerStatus::Paused;
        }))
    }

    pub fn renamed(&self, name: &str) -> StoreResult<Option<Self>> {
        let name = validate_name(name)?;
        Ok(self.transition(|t| t.name = name))
    }

    /// One second of countdown; `None` unless the timer is running
    pub fn advanced(&self, policy: FinishPolicy) -> Option<Self> {
        if !self.is_running() {
            return None;
        }

        self.transition(|t| match policy {
            FinishPolicy::Strict => {
                t.remaining_seconds = t.remaining_seconds.saturating_sub(1).max(0);
                if t.remaining_seconds == 0 {
                    t.status = TimerStatus::Finished;
                }
            }
            FinishPolicy::Overrun => {
                t.remaining_seconds = t.remaining_seconds.saturating_sub(1);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(total: i64) -> TimerRecord {
        TimerRecord::new("Speech", total).unwrap().started().unwrap()
    }

    #[test]
    fn new_timer_is_paused_with_full_duration() {
        let timer = TimerRecord::new("  Speech ", 90).unwrap();

        assert_eq!(timer.name, "Speech");
        assert_eq!(timer.status, TimerStatus::Paused);
        assert_eq!(timer.remaining_seconds, 90);
        assert!(timer.created_at.is_some());
    }

    #[test]
    fn rejects_empty_name_and_non_positive_duration() {
        assert!(matches!(TimerRecord::new("   ", 10), Err(StoreError::Validation(_))));
        assert!(matches!(TimerRecord::new("Speech", 0), Err(StoreError::Validation(_))));
        assert!(matches!(TimerRecord::new("Speech", -5), Err(StoreError::Validation(_))));
    }

    #[test]
    fn ids_are_unique() {
        let a = TimerRecord::new("A", 1).unwrap();
        let b = TimerRecord::new("A", 1).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn start_and_pause_are_idempotent() {
        let timer = running(90);
        assert!(timer.started().is_none());

        let paused = timer.paused().unwrap();
        assert_eq!(paused.status, TimerStatus::Paused);
        assert!(paused.paused().is_none());
    }

    #[test]
    fn finished_timer_cannot_be_started() {
        let mut timer = running(1);
        timer = timer.advanced(FinishPolicy::Strict).unwrap();

        assert_eq!(timer.status, TimerStatus::Finished);
        assert!(timer.started().is_none());
        assert!(timer.paused().is_none());
    }

    #[test]
    fn strict_policy_stops_at_zero() {
        let mut timer = running(2);
        timer = timer.advanced(FinishPolicy::Strict).unwrap();
        assert_eq!((timer.remaining_seconds, timer.status), (1, TimerStatus::Running));

        timer = timer.advanced(FinishPolicy::Strict).unwrap();
        assert_eq!((timer.remaining_seconds, timer.status), (0, TimerStatus::Finished));
        assert!(timer.advanced(FinishPolicy::Strict).is_none());
    }

    #[test]
    fn strict_policy_clamps_an_overrun_record() {
        let mut timer = running(5);
        timer.remaining_seconds = -3;

        let next = timer.advanced(FinishPolicy::Strict).unwrap();
        assert_eq!((next.remaining_seconds, next.status), (0, TimerStatus::Finished));
    }

    #[test]
    fn overrun_policy_counts_past_zero() {
        let mut timer = running(1);
        for _ in 0..3 {
            timer = timer.advanced(FinishPolicy::Overrun).unwrap();
        }

        assert_eq!(timer.remaining_seconds, -2);
        assert_eq!(timer.status, TimerStatus::Running);
        assert!(timer.is_overrun());
    }

    #[test]
    fn paused_timer_does_not_advance() {
        let timer = TimerRecord::new("Speech", 90).unwrap();
        assert!(timer.advanced(FinishPolicy::Strict).is_none());
    }

    #[test]
    fn reset_restores_total_from_any_state() {
        let mut timer = running(3);
        for _ in 0..3 {
            timer = timer.advanced(FinishPolicy::Strict).unwrap();
        }

        let reset = timer.reset().unwrap();
        assert_eq!(reset.remaining_seconds, 3);
        assert_eq!(reset.status, TimerStatus::Paused);
        assert!(reset.reset().is_none());
    }

    #[test]
    fn set_duration_on_finished_timer() {
        let mut timer = running(1);
        timer = timer.advanced(FinishPolicy::Strict).unwrap();

        let edited = timer.with_duration(120).unwrap().unwrap();
        assert_eq!(edited.status, TimerStatus::Paused);
        assert_eq!(edited.total_seconds, 120);
        assert_eq!(edited.remaining_seconds, 120);
        assert!(matches!(timer.with_duration(0), Err(StoreError::Validation(_))));
    }

    #[test]
    fn rename_keeps_countdown_state() {
        let timer = running(90);
        let renamed = timer.renamed("Keynote").unwrap().unwrap();

        assert_eq!(renamed.name, "Keynote");
        assert_eq!(renamed.status, TimerStatus::Running);
        assert!(timer.renamed("").is_err());
    }

    #[test]
    fn model_serializes_camel_case() {
        let value = serde_json::to_value(TimerRecord::new("Speech", 90).unwrap()).unwrap();
        assert_eq!(value["totalSeconds"], 90);
        assert_eq!(value["remainingSeconds"], 90);
        assert_eq!(value["status"], "paused");
    }
}
