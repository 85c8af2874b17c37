//! The single timezone a schedule is evaluated in, captured once at boot.
//!
//! The RTC is UTC by contract; schedule windows are expressed in terms of
//! local midnight. Everything else works in UTC and only converts through
//! this type at the boundary.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy)]
pub enum ScheduleTimeZone {
    Named(Tz),
    /// The system's local offset, resolved once and fixed for the run.
    Local,
}

impl ScheduleTimeZone {
    pub fn named(name: &str) -> Option<Self> {
        name.parse::<Tz>().ok().map(ScheduleTimeZone::Named)
    }

    /// UTC instant of local midnight on `date`.
    pub fn midnight_utc(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_hms_opt(0, 0, 0).expect("midnight always valid");
        match self {
            ScheduleTimeZone::Named(tz) => tz
                .from_local_datetime(&midnight)
                .single()
                .unwrap_or_else(|| tz.from_utc_datetime(&midnight))
                .with_timezone(&Utc),
            ScheduleTimeZone::Local => Local
                .from_local_datetime(&midnight)
                .single()
                .unwrap_or_else(|| Local.from_utc_datetime(&midnight))
                .with_timezone(&Utc),
        }
    }

    /// The local calendar date a UTC instant falls on.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            ScheduleTimeZone::Named(tz) => instant.with_timezone(tz).date_naive(),
            ScheduleTimeZone::Local => instant.with_timezone(&Local).date_naive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_zone_round_trips_date() {
        let tz = ScheduleTimeZone::named("Europe/Berlin").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let midnight = tz.midnight_utc(date);
        assert_eq!(tz.local_date(midnight), date);
    }

    #[test]
    fn unknown_zone_name_is_none() {
        assert!(ScheduleTimeZone::named("Not/AZone").is_none());
    }
}
