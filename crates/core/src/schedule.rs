//! A single named on/off window ([`ScheduleEntry`]), and the synthetic
//! one-shot window a manual power-on produces ([`ButtonEntry`]).
//!
//! Both are folded into [`ScheduleItem`], a tagged union rather than a
//! shared base class: the only thing they have in common is the five
//! query operations below, and a `match` expresses that without coupling
//! either variant's internals to the other's.

use chrono::{DateTime, Duration, Utc};
use log::warn;

use crate::solar::Location;
use crate::time_expression::TimeExpression;
use crate::timezone::ScheduleTimeZone;

const SEARCH_BOUND: i32 = 7;

#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub name: String,
    pub start: TimeExpression,
    pub stop: TimeExpression,
    pub location: Option<Location>,
    pub timezone: ScheduleTimeZone,
}

impl ScheduleEntry {
    fn search_forward(&self, expr: &TimeExpression, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut date = self.timezone.local_date(now);
        for _ in 0..SEARCH_BOUND {
            match expr.resolve(date, self.timezone.midnight_utc(date), self.location) {
                Ok(candidate) if candidate > now => return Some(candidate),
                Ok(_) => date = date.succ_opt()?,
                Err(e) => {
                    warn!("entry '{}': {e}", self.name);
                    date = date.succ_opt()?
                }
            }
        }
        warn!(
            "entry '{}': search for next occurrence did not converge within {SEARCH_BOUND} days",
            self.name
        );
        None
    }

    fn search_backward(&self, expr: &TimeExpression, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut date = self.timezone.local_date(now);
        for _ in 0..SEARCH_BOUND {
            match expr.resolve(date, self.timezone.midnight_utc(date), self.location) {
                Ok(candidate) if candidate <= now => return Some(candidate),
                Ok(_) => date = date.pred_opt()?,
                Err(e) => {
                    warn!("entry '{}': {e}", self.name);
                    date = date.pred_opt()?
                }
            }
        }
        warn!(
            "entry '{}': search for previous occurrence did not converge within {SEARCH_BOUND} days",
            self.name
        );
        None
    }

    pub fn next_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.search_forward(&self.start, now)
    }

    pub fn next_stop(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.search_forward(&self.stop, now)
    }

    pub fn prev_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.search_backward(&self.start, now)
    }

    pub fn prev_stop(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.search_backward(&self.stop, now)
    }

    pub fn active(&self, now: DateTime<Utc>) -> bool {
        match (self.prev_start(now), self.prev_stop(now)) {
            (Some(start), Some(stop)) => start > stop,
            _ => false,
        }
    }
}

/// A synthetic entry representing "powered on by a human action", injected
/// once at boot when the HAT's action reason warrants it (see
/// [`crate::ActionReason::implies_button_entry`]).
#[derive(Debug, Clone)]
pub struct ButtonEntry {
    pub boot_instant: DateTime<Utc>,
    pub delay: Option<Duration>,
}

impl ButtonEntry {
    pub fn next_start(&self, _now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        None
    }

    pub fn next_stop(&self, _now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        None
    }

    pub fn prev_start(&self, _now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        Some(self.boot_instant)
    }

    pub fn prev_stop(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let stop = self.boot_instant + self.delay?;
        (stop <= now).then_some(stop)
    }

    pub fn active(&self, now: DateTime<Utc>) -> bool {
        match self.prev_stop(now) {
            None => true,
            Some(stop) => stop > now,
        }
    }
}

/// A schedule entry or a button entry, whichever a given slot of the
/// configuration holds.
#[derive(Debug, Clone)]
pub enum ScheduleItem {
    Entry(ScheduleEntry),
    Button(ButtonEntry),
}

impl ScheduleItem {
    pub fn next_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ScheduleItem::Entry(e) => e.next_start(now),
            ScheduleItem::Button(b) => b.next_start(now),
        }
    }

    pub fn next_stop(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ScheduleItem::Entry(e) => e.next_stop(now),
            ScheduleItem::Button(b) => b.next_stop(now),
        }
    }

    pub fn prev_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ScheduleItem::Entry(e) => e.prev_start(now),
            ScheduleItem::Button(b) => b.prev_start(now),
        }
    }

    pub fn prev_stop(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ScheduleItem::Entry(e) => e.prev_stop(now),
            ScheduleItem::Button(b) => b.prev_stop(now),
        }
    }

    pub fn active(&self, now: DateTime<Utc>) -> bool {
        match self {
            ScheduleItem::Entry(e) => e.active(now),
            ScheduleItem::Button(b) => b.active(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
    }

    fn entry(name: &str, start: &str, stop: &str) -> ScheduleEntry {
        ScheduleEntry {
            name: name.to_string(),
            start: TimeExpression::parse(start).unwrap(),
            stop: TimeExpression::parse(stop).unwrap(),
            location: None,
            timezone: ScheduleTimeZone::Named(chrono_tz::UTC),
        }
    }

    #[test]
    fn single_entry_active_inside_window() {
        let e = entry("s1", "00:00", "02:00");
        let now = utc(2024, 1, 1, 1, 30);
        assert!(e.active(now));
        assert_eq!(e.next_start(now), Some(utc(2024, 1, 2, 0, 0)));
        assert_eq!(e.next_stop(now), Some(utc(2024, 1, 1, 2, 0)));
    }

    #[test]
    fn single_entry_inactive_outside_window() {
        let e = entry("s1", "00:00", "02:00");
        let now = utc(2024, 1, 1, 3, 0);
        assert!(!e.active(now));
    }

    #[test]
    fn midnight_crossing_window_is_active_at_midnight() {
        let e = entry("overnight", "22:00", "05:00");
        assert!(e.active(utc(2024, 1, 1, 0, 30)));
        assert!(e.active(utc(2024, 1, 1, 23, 0)));
        assert!(!e.active(utc(2024, 1, 1, 12, 0)));
    }

    #[test]
    fn button_entry_active_until_delay_elapses() {
        let boot = utc(2024, 1, 1, 10, 0);
        let b = ButtonEntry {
            boot_instant: boot,
            delay: Some(Duration::minutes(30)),
        };
        assert!(b.active(utc(2024, 1, 1, 10, 15)));
        assert!(!b.active(utc(2024, 1, 1, 10, 45)));
    }

    #[test]
    fn button_entry_without_delay_stays_active() {
        let boot = utc(2024, 1, 1, 10, 0);
        let b = ButtonEntry {
            boot_instant: boot,
            delay: None,
        };
        assert!(b.active(utc(2024, 1, 5, 10, 0)));
    }
}
