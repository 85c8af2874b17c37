//! The parsed schedule document and the live configuration built from it.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use log::warn;
use serde::Deserialize;

use crate::duration;
use crate::schedule::{ScheduleEntry, ScheduleItem};
use crate::solar::Location;
use crate::time_expression::TimeExpression;
use crate::timezone::ScheduleTimeZone;

const MAX_SHUTDOWN_SEARCH: Duration = Duration::hours(24);

/// One `schedule:` list entry as written in the YAML document.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleDocumentEntry {
    pub name: String,
    pub start: String,
    pub stop: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// The schedule document exactly as it appears on disk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScheduleDocument {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub force_on: bool,
    pub button_delay: Option<String>,
    pub timezone: Option<String>,
    pub schedule: Vec<ScheduleDocumentEntry>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

fn warn_unknown_keys(context: &str, extra: &BTreeMap<String, serde_yaml::Value>) {
    for key in extra.keys() {
        warn!("{context}: ignoring unknown key '{key}'");
    }
}

/// Parse the YAML schedule document at `path`. A structurally broken
/// document (not a mapping, wrong field types) is the only failure mode;
/// unknown keys are logged and ignored, not rejected.
pub fn load_schedule_document(path: &Path) -> anyhow::Result<ScheduleDocument> {
    let text = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("could not read schedule file {}: {e}", path.display()))?;
    let doc: ScheduleDocument = serde_yaml::from_str(&text)
        .map_err(|e| anyhow::anyhow!("schedule file {} is malformed: {e}", path.display()))?;

    warn_unknown_keys(&format!("schedule file {}", path.display()), &doc.extra);
    for entry in &doc.schedule {
        warn_unknown_keys(&format!("schedule entry '{}'", entry.name), &entry.extra);
    }

    Ok(doc)
}

/// Scan a geoclue-style text file for the first two non-blank,
/// non-comment lines and parse them as decimal-degree latitude/longitude.
/// Absence of the file is not an error; it just means no fallback exists.
pub fn load_geolocation(path: &Path) -> Option<(f64, f64)> {
    let text = fs::read_to_string(path).ok()?;
    let mut numbers = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.parse::<f64>().ok());
    let lat = numbers.next()?;
    let lon = numbers.next()?;
    Some((lat, lon))
}

/// The live, queryable schedule: global flags plus the resolved entries.
#[derive(Debug, Clone)]
pub struct ScheduleConfiguration {
    pub force_on: bool,
    pub button_delay: Option<Duration>,
    pub entries: Vec<ScheduleItem>,
    pub location: Option<Location>,
    pub timezone: ScheduleTimeZone,
}

impl ScheduleConfiguration {
    /// Build a live configuration from the on-disk document, resolving
    /// location via the document first and `geolocation` as a fallback.
    /// Entries whose expressions don't parse, or whose expressions need a
    /// location that isn't available, are dropped (a warning is logged);
    /// the rest of the configuration still loads.
    pub fn from_document(doc: &ScheduleDocument, geolocation: Option<(f64, f64)>) -> Self {
        let location = match (doc.lat, doc.lon) {
            (Some(lat), Some(lon)) => Some(Location {
                latitude: lat,
                longitude: lon,
            }),
            _ => geolocation.map(|(lat, lon)| Location {
                latitude: lat,
                longitude: lon,
            }),
        };

        let timezone = doc
            .timezone
            .as_deref()
            .and_then(ScheduleTimeZone::named)
            .unwrap_or(ScheduleTimeZone::Local);

        let button_delay = doc.button_delay.as_deref().and_then(|text| {
            duration::parse(text)
                .inspect_err(|e| warn!("button_delay '{text}' is invalid: {e}"))
                .ok()
        });

        let mut entries = Vec::new();
        for raw in &doc.schedule {
            match Self::build_entry(raw, location, timezone) {
                Ok(entry) => entries.push(ScheduleItem::Entry(entry)),
                Err(reason) => warn!("dropping schedule entry '{}': {reason}", raw.name),
            }
        }

        let mut force_on = doc.force_on;
        if entries.is_empty() {
            warn!("no usable schedule entries, forcing force_on=true");
            force_on = true;
        }

        ScheduleConfiguration {
            force_on,
            button_delay,
            entries,
            location,
            timezone,
        }
    }

    fn build_entry(
        raw: &ScheduleDocumentEntry,
        location: Option<Location>,
        timezone: ScheduleTimeZone,
    ) -> Result<ScheduleEntry, String> {
        let start = TimeExpression::parse(&raw.start).map_err(|e| e.to_string())?;
        let stop = TimeExpression::parse(&raw.stop).map_err(|e| e.to_string())?;
        if (start.needs_location() || stop.needs_location()) && location.is_none() {
            return Err("relative time expression but no location is configured".to_string());
        }
        Ok(ScheduleEntry {
            name: raw.name.clone(),
            start,
            stop,
            location,
            timezone,
        })
    }

    /// Append a synthetic entry for a manual power-on event.
    pub fn inject_button_entry(&mut self, boot_instant: DateTime<Utc>) {
        self.entries
            .push(ScheduleItem::Button(crate::schedule::ButtonEntry {
                boot_instant,
                delay: self.button_delay,
            }));
    }

    pub fn active(&self, now: DateTime<Utc>) -> bool {
        self.force_on || self.entries.iter().any(|e| e.active(now))
    }

    pub fn next_startup(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.entries.iter().filter_map(|e| e.next_start(now)).min()
    }

    pub fn next_shutdown(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.force_on {
            return None;
        }

        let mut t = now;
        while self.active(t) {
            let candidate = self
                .entries
                .iter()
                .filter_map(|e| e.next_stop(t))
                .filter(|stop| *stop > now)
                .min();

            let Some(candidate) = candidate else {
                return None;
            };
            t = candidate;
            if t - now >= MAX_SHUTDOWN_SEARCH {
                return None;
            }
        }
        Some(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
    }

    fn doc_with_entries(entries: &[(&str, &str, &str)]) -> ScheduleDocument {
        ScheduleDocument {
            schedule: entries
                .iter()
                .map(|(name, start, stop)| ScheduleDocumentEntry {
                    name: name.to_string(),
                    start: start.to_string(),
                    stop: stop.to_string(),
                    extra: BTreeMap::new(),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn s1_single_window() {
        let doc = doc_with_entries(&[("s1", "00:00", "02:00")]);
        let sc = ScheduleConfiguration::from_document(&doc, None);
        let now = utc(2024, 1, 1, 1, 30);
        assert!(sc.active(now));
        assert_eq!(sc.next_startup(now), Some(utc(2024, 1, 2, 0, 0)));
        assert_eq!(sc.next_shutdown(now), Some(utc(2024, 1, 1, 2, 0)));
    }

    #[test]
    fn s2_s3_s4_overlapping_windows() {
        let doc = doc_with_entries(&[
            ("s1", "00:00", "02:00"),
            ("s2", "01:00", "05:00"),
            ("s3", "03:00", "04:00"),
            ("s4", "05:00", "23:59"),
        ]);
        let sc = ScheduleConfiguration::from_document(&doc, None);

        // s2 (01:00-05:00) and s4 (05:00-23:59) are contiguous: s4 is
        // already active at the instant s2 stops (start is inclusive), so
        // the sweep runs straight through 05:00 to s4's own stop.
        let t1 = utc(2024, 1, 1, 2, 30);
        assert!(sc.active(t1));
        assert_eq!(sc.next_shutdown(t1), Some(utc(2024, 1, 1, 23, 59)));

        let t2 = utc(2024, 1, 1, 4, 30);
        assert!(sc.active(t2));
        assert_eq!(sc.next_shutdown(t2), Some(utc(2024, 1, 1, 23, 59)));

        let t3 = utc(2024, 1, 1, 5, 0);
        assert!(sc.active(t3));
        assert_eq!(sc.next_shutdown(t3), Some(utc(2024, 1, 1, 23, 59)));
    }

    #[test]
    fn s5_force_on_overrides_everything() {
        let mut doc = doc_with_entries(&[]);
        doc.force_on = true;
        let sc = ScheduleConfiguration::from_document(&doc, None);
        let now = utc(2024, 1, 1, 12, 0);
        assert!(sc.active(now));
        assert_eq!(sc.next_shutdown(now), None);
        assert_eq!(sc.next_startup(now), None);
    }

    #[test]
    fn empty_schedule_forces_force_on() {
        let doc = doc_with_entries(&[]);
        let sc = ScheduleConfiguration::from_document(&doc, None);
        assert!(sc.force_on);
    }

    #[test]
    fn relative_entry_without_location_is_dropped() {
        let doc = doc_with_entries(&[("sun", "sunrise-01:00", "sunset+01:00")]);
        let sc = ScheduleConfiguration::from_document(&doc, None);
        assert!(sc.entries.is_empty());
        assert!(sc.force_on);
    }

    #[test]
    fn relative_entry_with_location_resolves() {
        let mut doc = doc_with_entries(&[("sun", "sunrise-01:00", "sunset+01:00")]);
        doc.lat = Some(50.85318);
        doc.lon = Some(8.78735);
        let sc = ScheduleConfiguration::from_document(&doc, None);
        assert_eq!(sc.entries.len(), 1);
        let now = doc
            .lat
            .map(|_| utc(2024, 1, 1, 0, 0))
            .unwrap();
        // Before sunrise-1h, the window has not started yet today.
        assert!(sc.next_startup(now).is_some());
    }

    #[test]
    fn geolocation_fallback_used_when_document_has_no_coordinates() {
        let doc = doc_with_entries(&[("sun", "sunrise-01:00", "sunset+01:00")]);
        let sc = ScheduleConfiguration::from_document(&doc, Some((50.85318, 8.78735)));
        assert_eq!(sc.entries.len(), 1);
    }

    #[test]
    fn button_entry_injection_keeps_host_on() {
        let doc = doc_with_entries(&[("s1", "00:00", "01:00")]);
        let mut sc = ScheduleConfiguration::from_document(&doc, None);
        let boot = utc(2024, 1, 1, 12, 0);
        sc.inject_button_entry(boot);
        assert!(sc.active(boot));
    }
}
