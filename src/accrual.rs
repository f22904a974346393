/// Focus-time accounting: interval crediting, the daily ledger and the focus score
use crate::session::PomoState;
use chrono::{Local, NaiveDate, TimeZone};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weekly goal behind the focus score (2h/day over 7 days)
pub const WEEKLY_GOAL_HOURS: f64 = 14.0;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// An open focus interval (`focusInterval` key)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusInterval {
    pub started_at_ms: i64,
    pub start_time_left: i64,
}

impl FocusInterval {
    /// Seconds to credit when the interval closes
    ///
    /// Takes the larger of wall-clock time and countdown progress, so a host
    /// that slept through ticks is not undercounted.
    pub fn credited_seconds(&self, time_left_at_close: i64, now_ms: i64) -> f64 {
        let by_clock = (now_ms - self.started_at_ms) as f64 / 1000.0;
        let by_timer = (self.start_time_left - time_left_at_close) as f64;
        by_clock.max(by_timer).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccrualEvent {
    Opened(FocusInterval),
    Closed { seconds: f64 },
    Unchanged,
}

/// Decide what a session transition means for focus accounting
///
/// An interval opens on entering an active Focus phase and closes when
/// that stops being true: pause, switch to Break, or completion. Ticks
/// inside a phase change nothing.
pub fn observe_transition(before: &PomoState, after: &PomoState, open: Option<&FocusInterval>, now_ms: i64) -> AccrualEvent {
    match (before.is_focusing(), after.is_focusing()) {
        (true, false) => match open {
            Some(interval) => AccrualEvent::Closed {
                seconds: interval.credited_seconds(before.time_left, now_ms),
            },
            None => {
                debug!("focus ended with no open interval; nothing to credit");
                AccrualEvent::Unchanged
            }
        },
        (false, true) => AccrualEvent::Opened(FocusInterval {
            started_at_ms: now_ms,
            start_time_left: after.time_left,
        }),
        (true, true) if open.is_none() => AccrualEvent::Opened(FocusInterval {
            started_at_ms: now_ms,
            start_time_left: after.time_left,
        }),
        _ => AccrualEvent::Unchanged,
    }
}

/// Local calendar date for a wall-clock timestamp
pub fn local_date(now_ms: i64) -> NaiveDate {
    Local
        .timestamp_millis_opt(now_ms)
        .single()
        .map(|dt| dt.date_naive())
        .unwrap_or_else(|| Local::now().date_naive())
}

/// Focused hours per local date (`dailyTimeData` key)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyLedger {
    pub days: BTreeMap<String, f64>,
}

impl DailyLedger {
    pub fn new() -> Self {
        DailyLedger { days: BTreeMap::new() }
    }

    /// Add focused seconds to a date; returns the hours added
    pub fn credit(&mut self, date: NaiveDate, seconds: f64) -> f64 {
        let hours = seconds / 3600.0;
        if hours.is_nan() || hours <= 0.0 {
            return 0.0;
        }
        *self.days.entry(date.format(DATE_FORMAT).to_string()).or_insert(0.0) += hours;
        hours
    }

    pub fn hours_on(&self, date: NaiveDate) -> f64 {
        self.days.get(&date.format(DATE_FORMAT).to_string()).copied().unwrap_or(0.0)
    }

    /// Hours per day for the `n` days ending today, oldest first
    pub fn last_days(&self, today: NaiveDate, n: u32) -> Vec<(NaiveDate, f64)> {
        (0..n)
            .rev()
            .filter_map(|offset| today.checked_sub_days(chrono::Days::new(u64::from(offset))))
            .map(|date| (date, self.hours_on(date)))
            .collect()
    }

    /// Last 7 days (today included) against the weekly goal, 0..=100
    pub fn focus_score(&self, today: NaiveDate) -> u32 {
        let hours: f64 = self
            .days
            .iter()
            .filter_map(|(key, hours)| NaiveDate::parse_from_str(key, DATE_FORMAT).ok().map(|d| (d, *hours)))
            .filter(|(date, _)| (0..=6).contains(&(today - *date).num_days()))
            .map(|(_, hours)| hours)
            .sum();

        ((hours / WEEKLY_GOAL_HOURS) * 100.0).round().clamp(0.0, 100.0) as u32
    }
}
