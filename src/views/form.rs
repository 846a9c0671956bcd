//! Timer creation input

use serde::Deserialize;

use crate::state::{validate_duration, validate_name, StoreError, StoreResult};

/// New-timer input: either `total_seconds` or hours/minutes/seconds
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimerForm {
    pub name: String,
    #[serde(default)]
    pub total_seconds: Option<i64>,
    #[serde(default)]
    pub hours: i64,
    #[serde(default)]
    pub minutes: i64,
    #[serde(default)]
    pub seconds: i64,
}

impl TimerForm {
    /// Validated `(name, total_seconds)` pair
    pub fn validate(&self) -> StoreResult<(String, i64)> {
        let name = validate_name(&self.name)?;
        let total = match self.total_seconds {
            Some(total) => total,
            None => {
                if self.hours < 0 || self.minutes < 0 || self.seconds < 0 {
                    return Err(StoreError::Validation(
                        "hours, minutes and seconds must not be negative".to_string(),
                    ));
                }
                self.hours
                    .saturating_mul(3600)
                    .saturating_add(self.minutes.saturating_mul(60))
                    .saturating_add(self.seconds)
            }
        };
        Ok((name, validate_duration(total)?))
    }
}
