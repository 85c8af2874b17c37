//! Schedule evaluation and hardware-alarm projection for a battery/RTC
//! power-management HAT.

pub mod action_reason;
pub mod alarm;
pub mod bcd;
pub mod clock_trust;
pub mod config;
pub mod duration;
pub mod error;
pub mod hat;
pub mod schedule;
pub mod solar;
pub mod time_expression;
pub mod timezone;

pub use action_reason::ActionReason;
pub use alarm::AlarmFields;
pub use clock_trust::ClockSources;
pub use config::{ScheduleConfiguration, ScheduleDocument};
pub use error::{ClockTrustError, ConfigError, DaemonError, HardwareError};
pub use hat::{FakeHat, HardwareClock, I2cHat};
pub use schedule::{ButtonEntry, ScheduleEntry, ScheduleItem};
pub use time_expression::TimeExpression;

/// Re-exported so downstream crates don't need a direct `anyhow`/`chrono`
/// dependency just to name the types this crate's public API uses.
pub use anyhow;
pub use chrono;
