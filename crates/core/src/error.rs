//! Layered error taxonomy.
//!
//! `anyhow::Error` is used wherever a caller only propagates and annotates
//! an error; the enums below are used wherever a caller needs to match on
//! *why* something failed (to pick an exit code or a retry strategy).

use thiserror::Error;

/// A single schedule entry or document failed to parse or resolve.
/// Callers drop the offending entry and continue.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown time reference '{0}'")]
    UnknownReference(String),

    #[error("relative time expression '{0}' has no location to resolve against")]
    MissingLocation(String),

    #[error("could not parse duration '{0}'")]
    BadDuration(String),

    #[error("could not parse time expression '{0}'")]
    BadTimeExpression(String),
}

/// A failure talking to the HAT over I2C, or a HAT that answered with
/// unexpected data.
#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("could not open i2c bus {0}: {1}")]
    BusOpen(String, #[source] std::io::Error),

    #[error("could not bind i2c slave address {0:#04x}: {1}")]
    SlaveBind(u16, #[source] nix::Error),

    #[error("i2c read of register {0:#04x} failed: {1}")]
    Read(u8, #[source] std::io::Error),

    #[error("i2c write of register {0:#04x} failed: {1}")]
    Write(u8, #[source] std::io::Error),

    #[error("unexpected firmware id {found:#04x}, expected {expected:#04x}")]
    UnexpectedFirmwareId { found: u8, expected: u8 },
}

/// The RTC could not be trusted at boot.
#[derive(Error, Debug)]
pub enum ClockTrustError {
    #[error("no clock source is available: {0}")]
    NoClockSource(#[from] NoClockSource),

    #[error("rtc time {rtc} is earlier than last known time {last_known}")]
    RtcBehindLastKnown {
        rtc: String,
        last_known: String,
    },

    #[error("rtc time {rtc} disagrees with system time {system} by more than {threshold_secs}s")]
    RtcSystemMismatch {
        rtc: String,
        system: String,
        threshold_secs: i64,
    },

    #[error("could not mark the clock as synchronized: {0}")]
    Io(#[from] std::io::Error),
}

/// None of the filesystem-visible "last known wall time" hints exist.
#[derive(Error, Debug)]
#[error("no clock source files are available")]
pub struct NoClockSource;

/// Top-level error the daemon's control loop matches on to pick an exit code.
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    ClockTrust(#[from] ClockTrustError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DaemonError {
    /// Exit code mandated for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::Hardware(_) => 1,
            DaemonError::ClockTrust(_) => 3,
            DaemonError::Other(_) => 1,
        }
    }
}
