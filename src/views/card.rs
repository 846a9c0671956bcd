//! Read-only rendering of a single timer, shared by every view

use std::fmt;
use serde::Serialize;

use crate::state::{TimerRecord, TimerStatus};

/// Display data for one timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerCard {
    pub id: String,
    pub name: String,
    pub status: TimerStatus,
    /// `HH:MM:SS`, prefixed with `-` when overrun
    pub remaining: String,
    pub total: String,
    pub remaining_seconds: i64,
    pub total_seconds: i64,
    /// Elapsed share of the duration, 0..=100
    pub progress_percent: u8,
    pub overrun: bool,
}

impl TimerCard {
    pub fn render(timer: &TimerRecord) -> Self {
        Self {
            id: timer.id.clone(),
            name: timer.name.clone(),
            status: timer.status,
            remaining: format_clock(timer.remaining_seconds),
            total: format_clock(timer.total_seconds),
            remaining_seconds: timer.remaining_seconds,
            total_seconds: timer.total_seconds,
            progress_percent: progress_percent(timer.total_seconds, timer.remaining_seconds),
            overrun: timer.is_overrun(),
        }
    }
}

impl fmt::Display for TimerCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.overrun {
            "OVERRUN".to_string()
        } else {
            self.status.as_str().to_uppercase()
        };
        write!(
            f,
            "{:<9} {:<24} {:>9} / {} {:>3}%",
            status, self.name, self.remaining, self.total, self.progress_percent
        )
    }
}

/// Format seconds as `HH:MM:SS`, negative values with a leading `-`
pub fn format_clock(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let abs = seconds.unsigned_abs();
    format!(
        "{}{:02}:{:02}:{:02}",
        sign,
        abs / 3600,
        (abs % 3600) / 60,
        abs % 60
    )
}

fn progress_percent(total_seconds: i64, remaining_seconds: i64) -> u8 {
    if total_seconds <= 0 {
        return 0;
    }
    let elapsed = total_seconds.saturating_sub(remaining_seconds);
    let percent = elapsed.saturating_mul(100) / total_seconds;
    percent.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FinishPolicy;

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "00:00:00");
        assert_eq!(format_clock(87), "00:01:27");
        assert_eq!(format_clock(3_661), "01:01:01");
        assert_eq!(format_clock(-75), "-00:01:15");
        assert_eq!(format_clock(360_000), "100:00:00");
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(progress_percent(100, 100), 0);
        assert_eq!(progress_percent(100, 25), 75);
        assert_eq!(progress_percent(100, -40), 100);
        assert_eq!(progress_percent(0, 0), 0);
    }

    #[test]
    fn overrun_card() {
        let mut timer = TimerRecord::new("Break", 1).unwrap().started().unwrap();
        timer = timer.advanced(FinishPolicy::Overrun).unwrap();
        timer = timer.advanced(FinishPolicy::Overrun).unwrap();

        let card = TimerCard::render(&timer);
        assert!(card.overrun);
        assert_eq!(card.remaining, "-00:00:01");
        assert_eq!(card.progress_percent, 100);
        assert!(card.to_string().starts_with("OVERRUN"));
    }

    #[test]
    fn paused_card_line() {
        let card = TimerCard::render(&TimerRecord::new("Speech", 90).unwrap());
        let line = card.to_string();

        assert!(line.starts_with("PAUSED"));
        assert!(line.contains("Speech"));
        assert!(line.contains("00:01:30 / 00:01:30"));
    }
}
