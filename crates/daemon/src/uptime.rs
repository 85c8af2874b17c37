//! Reading the kernel's monotonic uptime, used once at boot to derive
//! `boot_instant = now - uptime` for a synthesized [`powerhat_core::ButtonEntry`].

use std::fs;

use chrono::{DateTime, Duration, Utc};

/// Host uptime, read from `/proc/uptime`'s first field (seconds, with
/// fractional precision). `None` if the file is missing or malformed,
/// e.g. when not running on Linux.
pub fn uptime() -> Option<Duration> {
    let text = fs::read_to_string("/proc/uptime").ok()?;
    let seconds: f64 = text.split_whitespace().next()?.parse().ok()?;
    Some(Duration::milliseconds((seconds * 1000.0) as i64))
}

/// `now - uptime`, falling back to `now` itself if uptime can't be read
/// (treats the daemon's own start as the boot instant).
pub fn boot_instant(now: DateTime<Utc>) -> DateTime<Utc> {
    match uptime() {
        Some(up) => now - up,
        None => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_instant_is_not_after_now() {
        let now = Utc::now();
        assert!(boot_instant(now) <= now);
    }
}
