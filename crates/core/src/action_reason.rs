//! The HAT's "why did I wake up" register.

use log::warn;

/// Reason the HAT most recently powered the host on (or the reason it is
/// still running despite an alarm firing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionReason {
    AlarmStartup,
    AlarmShutdown,
    ButtonClick,
    LowVoltage,
    VoltageRestore,
    OverTemperature,
    BelowTemperature,
    AlarmStartupDelayed,
    PowerConnected,
    Reboot,
    GuaranteedWake,
    /// An unrecognized register value. Treated as "normal" everywhere.
    Unknown(u8),
}

impl ActionReason {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x01 => ActionReason::AlarmStartup,
            0x02 => ActionReason::AlarmShutdown,
            0x03 => ActionReason::ButtonClick,
            0x04 => ActionReason::LowVoltage,
            0x05 => ActionReason::VoltageRestore,
            0x06 => ActionReason::OverTemperature,
            0x07 => ActionReason::BelowTemperature,
            0x08 => ActionReason::AlarmStartupDelayed,
            0x0A => ActionReason::PowerConnected,
            0x0B => ActionReason::Reboot,
            0x0C => ActionReason::GuaranteedWake,
            other => {
                warn!("unrecognized action_reason byte {other:#04x}, treating as normal");
                ActionReason::Unknown(other)
            }
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            ActionReason::AlarmStartup => 0x01,
            ActionReason::AlarmShutdown => 0x02,
            ActionReason::ButtonClick => 0x03,
            ActionReason::LowVoltage => 0x04,
            ActionReason::VoltageRestore => 0x05,
            ActionReason::OverTemperature => 0x06,
            ActionReason::BelowTemperature => 0x07,
            ActionReason::AlarmStartupDelayed => 0x08,
            ActionReason::PowerConnected => 0x0A,
            ActionReason::Reboot => 0x0B,
            ActionReason::GuaranteedWake => 0x0C,
            ActionReason::Unknown(b) => b,
        }
    }

    /// Should a freshly booted daemon synthesize a [`crate::ButtonEntry`]?
    pub fn implies_button_entry(self) -> bool {
        matches!(
            self,
            ActionReason::ButtonClick | ActionReason::VoltageRestore | ActionReason::PowerConnected
        )
    }

    /// Did an alarm-class condition fire, meaning the host should be
    /// shutting down right now regardless of what the schedule says?
    pub fn is_alarm_class(self) -> bool {
        matches!(
            self,
            ActionReason::AlarmShutdown | ActionReason::LowVoltage | ActionReason::OverTemperature
        )
    }
}

impl std::fmt::Display for ActionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionReason::AlarmStartup => "alarm-startup",
            ActionReason::AlarmShutdown => "alarm-shutdown",
            ActionReason::ButtonClick => "button-click",
            ActionReason::LowVoltage => "low-voltage",
            ActionReason::VoltageRestore => "voltage-restore",
            ActionReason::OverTemperature => "over-temperature",
            ActionReason::BelowTemperature => "below-temperature",
            ActionReason::AlarmStartupDelayed => "alarm-startup-delayed",
            ActionReason::PowerConnected => "power-connected",
            ActionReason::Reboot => "reboot",
            ActionReason::GuaranteedWake => "guaranteed-wake",
            ActionReason::Unknown(_) => "unknown",
        };
        write!(f, "{name} ({:#04x})", self.to_byte())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_values() {
        for byte in [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x0A, 0x0B, 0x0C] {
            assert_eq!(ActionReason::from_byte(byte).to_byte(), byte);
        }
    }

    #[test]
    fn unknown_byte_is_treated_as_normal() {
        let reason = ActionReason::from_byte(0x42);
        assert!(!reason.implies_button_entry());
        assert!(!reason.is_alarm_class());
    }

    #[test]
    fn button_like_reasons_inject_button_entry() {
        assert!(ActionReason::ButtonClick.implies_button_entry());
        assert!(ActionReason::VoltageRestore.implies_button_entry());
        assert!(ActionReason::PowerConnected.implies_button_entry());
        assert!(!ActionReason::AlarmStartup.implies_button_entry());
    }

    #[test]
    fn alarm_class_reasons() {
        assert!(ActionReason::AlarmShutdown.is_alarm_class());
        assert!(ActionReason::LowVoltage.is_alarm_class());
        assert!(ActionReason::OverTemperature.is_alarm_class());
        assert!(!ActionReason::AlarmStartup.is_alarm_class());
    }
}
