//! Boot-time arbiter for whether the HAT's RTC reading can be trusted.
//!
//! The RTC is battery-backed and keeps ticking while the host is off, but a
//! dead coin cell or a HAT that has never seen a real timestamp can leave it
//! reporting 2000-01-01 or some other nonsense date. Before the schedule
//! evaluator is allowed to trust `rtc_datetime`, this module cross-checks it
//! against whatever evidence the filesystem has of "the last wall-clock time
//! this host is known to have seen" and against the system clock.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::error::{ClockTrustError, NoClockSource};

/// The filesystem paths this arbiter consults. Broken out so tests can
/// point at a scratch directory instead of the real system paths.
#[derive(Debug, Clone)]
pub struct ClockSources {
    /// `fake-hwclock`'s save file: `YYYY-MM-DD HH:MM:SS\n` in UTC.
    pub fake_hwclock: PathBuf,
    /// systemd-timesyncd's "last sync" marker; its mtime is the signal.
    pub timesync_clock: PathBuf,
    /// chrony's drift file; its mtime is the signal.
    pub chrony_drift: PathBuf,
    /// Touched once validation succeeds, to advertise good time to others.
    pub synchronized_flag: PathBuf,
}

impl Default for ClockSources {
    fn default() -> Self {
        ClockSources {
            fake_hwclock: PathBuf::from("/etc/fake-hwclock.data"),
            timesync_clock: PathBuf::from("/var/lib/systemd/timesync/clock"),
            chrony_drift: PathBuf::from("/var/lib/chrony/chrony.drift"),
            synchronized_flag: PathBuf::from("/run/systemd/timesync/synchronized"),
        }
    }
}

const MISMATCH_THRESHOLD: Duration = Duration::seconds(2);

fn read_fake_hwclock(path: &Path) -> Option<DateTime<Utc>> {
    let text = fs::read_to_string(path).ok()?;
    let naive = NaiveDateTime::parse_from_str(text.trim(), "%Y-%m-%d %H:%M:%S").ok()?;
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}

fn mtime(path: &Path) -> Option<DateTime<Utc>> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

/// The most recent plausible "last known wall time", or [`NoClockSource`] if
/// none of the three hints are present.
pub fn last_known_time(sources: &ClockSources) -> Result<DateTime<Utc>, NoClockSource> {
    [
        read_fake_hwclock(&sources.fake_hwclock),
        mtime(&sources.timesync_clock),
        mtime(&sources.chrony_drift),
    ]
    .into_iter()
    .flatten()
    .max()
    .ok_or(NoClockSource)
}

/// Validate the HAT's RTC reading against the last known time and the
/// system clock. Does not touch the filesystem; callers call
/// [`mark_synchronized`] themselves once this returns `Ok`.
pub fn validate(
    rtc_datetime: DateTime<Utc>,
    system_now: DateTime<Utc>,
    last_known: DateTime<Utc>,
) -> Result<(), ClockTrustError> {
    if rtc_datetime < last_known {
        return Err(ClockTrustError::RtcBehindLastKnown {
            rtc: rtc_datetime.to_rfc3339(),
            last_known: last_known.to_rfc3339(),
        });
    }

    let drift = rtc_datetime - system_now;
    if drift.abs() > MISMATCH_THRESHOLD {
        return Err(ClockTrustError::RtcSystemMismatch {
            rtc: rtc_datetime.to_rfc3339(),
            system: system_now.to_rfc3339(),
            threshold_secs: MISMATCH_THRESHOLD.num_seconds(),
        });
    }

    Ok(())
}

/// Touch the flag file that advertises "time is good" to other services,
/// creating parent directories as needed.
pub fn mark_synchronized(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::File::create(path)?;
    Ok(())
}

/// Run the full boot-time check: gather the last known time, validate the
/// RTC against it and the system clock, and touch the synchronized flag on
/// success.
pub fn check(
    sources: &ClockSources,
    rtc_datetime: DateTime<Utc>,
    system_now: DateTime<Utc>,
) -> Result<(), ClockTrustError> {
    let last_known = last_known_time(sources)?;
    validate(rtc_datetime, system_now, last_known)?;
    mark_synchronized(&sources.synchronized_flag)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("powerhat-clock-trust-test-{name}-{:?}", std::thread::current().id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn no_sources_present_is_an_error() {
        let dir = scratch_dir("none");
        let sources = ClockSources {
            fake_hwclock: dir.join("fake-hwclock.data"),
            timesync_clock: dir.join("clock"),
            chrony_drift: dir.join("chrony.drift"),
            synchronized_flag: dir.join("run/synchronized"),
        };
        assert!(last_known_time(&sources).is_err());
    }

    #[test]
    fn fake_hwclock_file_is_read_as_utc() {
        let dir = scratch_dir("fake-hwclock");
        let path = dir.join("fake-hwclock.data");
        fs::write(&path, "2024-01-01 12:00:00\n").unwrap();
        let sources = ClockSources {
            fake_hwclock: path,
            timesync_clock: dir.join("missing-clock"),
            chrony_drift: dir.join("missing-drift"),
            synchronized_flag: dir.join("run/synchronized"),
        };
        let t = last_known_time(&sources).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn rtc_behind_last_known_is_rejected() {
        let last_known = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let rtc = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let err = validate(rtc, rtc, last_known).unwrap_err();
        assert!(matches!(err, ClockTrustError::RtcBehindLastKnown { .. }));
    }

    #[test]
    fn rtc_disagreeing_with_system_clock_is_rejected() {
        let last_known = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let rtc = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let system_now = rtc + Duration::seconds(10);
        let err = validate(rtc, system_now, last_known).unwrap_err();
        assert!(matches!(err, ClockTrustError::RtcSystemMismatch { .. }));
    }

    #[test]
    fn agreeing_clocks_within_threshold_pass() {
        let last_known = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let rtc = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let system_now = rtc + Duration::seconds(1);
        assert!(validate(rtc, system_now, last_known).is_ok());
    }

    #[test]
    fn mark_synchronized_creates_parent_dirs() {
        let dir = scratch_dir("mark-sync");
        let path = dir.join("nested/run/synchronized");
        mark_synchronized(&path).unwrap();
        assert!(path.exists());
    }
}
