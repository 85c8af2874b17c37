//! Sunrise/sunset and related solar events.
//!
//! Implemented as a self-contained pure function so that the schedule
//! evaluator can treat "where is the sun today" the same way it treats any
//! other external fact: given a date and a location, it is always available
//! and always deterministic. Uses the low-precision sunrise equation
//! (NOAA/Meeus), accurate to within a minute or two, which is well inside
//! the tolerance a minute-granularity schedule needs.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// A location on Earth's surface, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

const J2000: f64 = 2_451_545.0;
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

fn to_radians(deg: f64) -> f64 {
    deg * PI / 180.0
}

fn to_degrees(rad: f64) -> f64 {
    rad * 180.0 / PI
}

/// Julian day number at noon UTC of `date` (Fliegel & Van Flandern).
fn julian_day_at_noon(date: NaiveDate) -> f64 {
    let y = date.year() as i64;
    let m = date.month() as i64;
    let d = date.day() as i64;
    let a = (14 - m) / 12;
    let y2 = y + 4800 - a;
    let m2 = m + 12 * a - 3;
    let jdn = d + (153 * m2 + 2) / 5 + 365 * y2 + y2 / 4 - y2 / 100 + y2 / 400 - 32045;
    jdn as f64
}

fn julian_date_to_datetime(jd: f64) -> Option<DateTime<Utc>> {
    let unix_seconds = (jd - UNIX_EPOCH_JD) * 86_400.0;
    let secs = unix_seconds.floor() as i64;
    let nanos = ((unix_seconds - unix_seconds.floor()) * 1_000_000_000.0).round() as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// Solar transit (`J_transit`) and mean anomaly/ecliptic longitude, the
/// shared groundwork for every event at a given altitude threshold.
struct SolarDay {
    j_transit: f64,
    mean_anomaly_deg: f64,
    ecliptic_longitude_deg: f64,
    declination_deg: f64,
}

fn solar_day(date: NaiveDate, location: Location) -> SolarDay {
    let j_date = julian_day_at_noon(date);
    let n = j_date - J2000 + 0.0009 - location.longitude / 360.0;
    let n = n.round();

    let mean_anomaly_deg = (357.5291 + 0.98560028 * n).rem_euclid(360.0);
    let m = to_radians(mean_anomaly_deg);

    let equation_of_center =
        1.9148 * m.sin() + 0.0200 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin();

    let ecliptic_longitude_deg =
        (mean_anomaly_deg + 102.9372 + equation_of_center + 180.0).rem_euclid(360.0);
    let lambda = to_radians(ecliptic_longitude_deg);

    let j_transit = J2000
        + n
        + 0.0009
        + location.longitude / 360.0
        + 0.0053 * m.sin()
        - 0.0069 * (2.0 * lambda).sin();

    let declination_deg = to_degrees((to_radians(23.4397).sin() * lambda.sin()).asin());

    SolarDay {
        j_transit,
        mean_anomaly_deg,
        ecliptic_longitude_deg,
        declination_deg,
    }
}

/// `None` if the sun never crosses `altitude_deg` on this day at this
/// latitude (polar day/night).
fn hour_angle(day: &SolarDay, location: Location, altitude_deg: f64) -> Option<f64> {
    let phi = to_radians(location.latitude);
    let delta = to_radians(day.declination_deg);
    let cos_omega = (to_radians(altitude_deg).sin() - phi.sin() * delta.sin()) / (phi.cos() * delta.cos());
    if !(-1.0..=1.0).contains(&cos_omega) {
        return None;
    }
    Some(to_degrees(cos_omega.acos()))
}

fn event_at(date: NaiveDate, location: Location, altitude_deg: f64, rising: bool) -> Option<DateTime<Utc>> {
    let day = solar_day(date, location);
    let omega = hour_angle(&day, location, altitude_deg)?;
    let jd = if rising {
        day.j_transit - omega / 360.0
    } else {
        day.j_transit + omega / 360.0
    };
    julian_date_to_datetime(jd)
}

/// All solar events this crate knows how to compute, keyed by the name a
/// [`crate::TimeExpression`] reference can use.
///
/// Events whose altitude threshold the sun never crosses on this day at
/// this latitude (polar day/night) are simply absent from the map.
pub fn events(location: Location, date: NaiveDate) -> BTreeMap<&'static str, DateTime<Utc>> {
    let mut map = BTreeMap::new();

    let day = solar_day(date, location);
    if let Some(noon) = julian_date_to_datetime(day.j_transit) {
        map.insert("solar_noon", noon);
    }

    let thresholds: &[(&'static str, &'static str, f64)] = &[
        ("sunrise", "sunset", -0.833),
        ("civil_dawn", "civil_dusk", -6.0),
        ("nautical_dawn", "nautical_dusk", -12.0),
        ("astronomical_dawn", "astronomical_dusk", -18.0),
    ];

    for (rise_name, set_name, altitude) in thresholds {
        if let Some(rise) = event_at(date, location, *altitude, true) {
            map.insert(*rise_name, rise);
        }
        if let Some(set) = event_at(date, location, *altitude, false) {
            map.insert(*set_name, set);
        }
    }

    // Silence unused-field warnings on SolarDay fields kept for readability
    // of intermediate state during development/debugging.
    let _ = (day.mean_anomaly_deg, day.ecliptic_longitude_deg);

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    // Frankfurt, Germany, matching the reference fixture this schedule
    // format was validated against.
    const FRANKFURT: Location = Location {
        latitude: 50.85318,
        longitude: 8.78735,
    };

    #[test]
    fn sunrise_before_sunset_in_january() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let map = events(FRANKFURT, date);
        let sunrise = map["sunrise"];
        let sunset = map["sunset"];
        assert!(sunrise < sunset);
        // Winter sunrise in Frankfurt is mid-morning UTC, not the middle of the night.
        assert!(sunrise.hour() >= 6 && sunrise.hour() <= 9);
        assert!(sunset.hour() >= 14 && sunset.hour() <= 17);
    }

    #[test]
    fn civil_dawn_precedes_sunrise() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let map = events(FRANKFURT, date);
        assert!(map["civil_dawn"] < map["sunrise"]);
        assert!(map["sunset"] < map["civil_dusk"]);
    }

    #[test]
    fn polar_night_has_no_sunrise() {
        let svalbard = Location {
            latitude: 78.2232,
            longitude: 15.6267,
        };
        let date = NaiveDate::from_ymd_opt(2024, 12, 21).unwrap();
        let map = events(svalbard, date);
        assert!(!map.contains_key("sunrise"));
    }
}
