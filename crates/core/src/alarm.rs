//! Projecting a future datetime into the HAT's alarm registers, and the
//! inverse: reconstructing a datetime from the registers relative to the
//! RTC's current reading.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

/// The byte meaning "don't match this field" in any alarm register.
pub const WILDCARD: u8 = 80;

/// The five comparator fields of one hardware alarm (already in decimal,
/// not yet BCD-encoded; BCD conversion is the driver's concern at the
/// register-write boundary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlarmFields {
    pub second: u8,
    pub minute: u8,
    pub hour: u8,
    pub weekday: u8,
    pub day: u8,
}

impl AlarmFields {
    pub const DISABLED: AlarmFields = AlarmFields {
        second: WILDCARD,
        minute: WILDCARD,
        hour: WILDCARD,
        weekday: WILDCARD,
        day: WILDCARD,
    };

    pub fn is_disabled(&self) -> bool {
        self.day == 0 || *self == Self::DISABLED
    }
}

/// Project a future datetime into the fields that will make the HAT's
/// alarm comparator match exactly that instant. Weekday is wildcarded: the
/// comparator only needs `(day, hour, minute, second)` to pin a unique
/// future moment, and constraining weekday too would be redundant.
pub fn project(target: DateTime<Utc>) -> AlarmFields {
    AlarmFields {
        second: target.second() as u8,
        minute: target.minute() as u8,
        hour: target.hour() as u8,
        weekday: WILDCARD,
        day: target.day() as u8,
    }
}

/// Reconstruct the datetime an alarm's fields describe, relative to the
/// RTC's current reading. `None` if the alarm is disabled, or if the
/// search does not converge (should not happen for any project()-produced
/// fields; guards against corrupt registers).
pub fn reconstruct(fields: AlarmFields, rtc_now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if fields.is_disabled() {
        return None;
    }

    let mut t = rtc_now;

    if fields.second != WILDCARD {
        for _ in 0..=61 {
            if t.second() as u8 == fields.second {
                break;
            }
            t += Duration::seconds(1);
        }
        if t.second() as u8 != fields.second {
            return None;
        }
    }

    if fields.minute != WILDCARD {
        for _ in 0..=61 {
            if t.minute() as u8 == fields.minute {
                break;
            }
            t += Duration::minutes(1);
        }
        if t.minute() as u8 != fields.minute {
            return None;
        }
    }

    if fields.hour != WILDCARD {
        for _ in 0..=25 {
            if t.hour() as u8 == fields.hour {
                break;
            }
            t += Duration::hours(1);
        }
        if t.hour() as u8 != fields.hour {
            return None;
        }
    }

    if fields.weekday != WILDCARD {
        for _ in 0..=8 {
            if t.weekday().num_days_from_sunday() as u8 == fields.weekday {
                break;
            }
            t += Duration::days(1);
        }
        if t.weekday().num_days_from_sunday() as u8 != fields.weekday {
            return None;
        }
    }

    if fields.day != WILDCARD {
        for _ in 0..=400 {
            if t.day() as u8 == fields.day {
                break;
            }
            t += Duration::days(1);
        }
        if t.day() as u8 != fields.day {
            return None;
        }
    }

    Some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn project_then_reconstruct_round_trips() {
        let target = Utc.with_ymd_and_hms(2024, 1, 15, 14, 5, 0).unwrap();
        let rtc_now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let fields = project(target);
        assert_eq!(
            fields,
            AlarmFields {
                second: 0,
                minute: 5,
                hour: 14,
                weekday: WILDCARD,
                day: 15,
            }
        );
        assert_eq!(reconstruct(fields, rtc_now), Some(target));
    }

    #[test]
    fn reconstruct_from_exact_match_is_a_no_op() {
        let target = Utc.with_ymd_and_hms(2024, 3, 3, 3, 3, 3).unwrap();
        let fields = project(target);
        assert_eq!(reconstruct(fields, target), Some(target));
    }

    #[test]
    fn disabled_fields_reconstruct_to_none() {
        assert_eq!(reconstruct(AlarmFields::DISABLED, Utc::now()), None);
        let mut fields = AlarmFields::DISABLED;
        fields.day = 0;
        fields.hour = 5;
        assert_eq!(reconstruct(fields, Utc::now()), None);
    }

    #[test]
    fn project_crossing_month_boundary_reconstructs_correctly() {
        let target = Utc.with_ymd_and_hms(2024, 2, 3, 0, 0, 0).unwrap();
        let rtc_now = Utc.with_ymd_and_hms(2024, 1, 30, 23, 0, 0).unwrap();
        let fields = project(target);
        assert_eq!(reconstruct(fields, rtc_now), Some(target));
    }
}
