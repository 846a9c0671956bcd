//! Storage shape of timer records and change notifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{TimerRecord, TimerStatus};

/// Table (collection) name used in change notifications
pub const TIMERS_TABLE: &str = "timers";

/// Timer record as seen by a persistence backend (snake_case columns)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerRow {
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

impl From<TimerRecord> for TimerRow {
    fn from(record: TimerRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            total_seconds: record.total_seconds,
            remaining_seconds: record.remaining_seconds,
            status: record.status,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<TimerRow> for TimerRecord {
    fn from(row: TimerRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            total_seconds: row.total_seconds,
            remaining_seconds: row.remaining_seconds,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Kind of change reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeEvent {
    Insert,
    Update,
    Delete,
}

/// Out-of-process change trigger.
///
/// Only ever treated as "something changed, re-fetch"; the payload is
/// never applied as a partial update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub event: ChangeEvent,
    pub table: String,
}

impl ChangeNotification {
    pub fn timers(event: ChangeEvent) -> Self {
        Self {
            event,
            table: TIMERS_TABLE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_uses_snake_case_columns() {
        let row = TimerRow {
            id: "t1".to_string(),
            name: "Speech".to_string(),
            total_seconds: 90,
            remaining_seconds: 42,
            status: TimerStatus::Running,
            created_at: None,
            updated_at: None,
        };

        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["total_seconds"], 90);
        assert_eq!(value["remaining_seconds"], 42);
        assert_eq!(value["status"], "running");
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn record_and_row_carry_the_same_fields() {
        let record = TimerRecord::new("Break", 300).unwrap();
        let row = TimerRow::from(record.clone());

        assert_eq!(row.id, record.id);
        assert_eq!(row.total_seconds, 300);
        assert_eq!(row.created_at, record.created_at);
        assert_eq!(TimerRecord::from(row), record);
    }

    #[test]
    fn notification_payload_shape() {
        let json = serde_json::to_value(ChangeNotification::timers(ChangeEvent::Delete)).unwrap();
        assert_eq!(json["event"], "DELETE");
        assert_eq!(json["table"], "timers");
    }
}
