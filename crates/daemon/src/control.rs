//! The per-tick and lifecycle operations driven by [`crate::app::run`]:
//! boot configuration, one tick of alarm reprogramming, and the terminal
//! alarm programming that runs once on a shutdown signal.

use chrono::Duration;
use log::warn;

use powerhat_core::{alarm, ActionReason, AlarmFields, HardwareClock, HardwareError, ScheduleConfiguration};

use crate::host::HostControl;

/// How far ahead of `now` to set the shutdown alarm when the schedule says
/// the host should not currently be active.
const INACTIVE_SHUTDOWN_DELAY: Duration = Duration::seconds(30);

/// Power-cut delay programmed into the HAT at boot, in tenths of a second
/// (2.5-3.0s, per the HAT's documented safe range for the supply rail to
/// settle before it's cut).
const POWER_CUT_DELAY_TENTHS: u8 = 25;

const DEFAULT_ON_DELAY_SECONDS: u8 = 1;

/// One-time boot configuration of the HAT: arm `default_on` so the board
/// powers back up if the alarm-fired flags are ever lost, and clear
/// whatever flags survived from the previous run.
pub fn configure(hat: &mut dyn HardwareClock) -> Result<(), HardwareError> {
    hat.set_default_on(true)?;
    hat.set_default_on_delay(DEFAULT_ON_DELAY_SECONDS)?;
    hat.set_power_cut_delay(POWER_CUT_DELAY_TENTHS)?;
    hat.clear_flags()
}

fn startup_alarm(sc: &ScheduleConfiguration, now: chrono::DateTime<chrono::Utc>) -> AlarmFields {
    sc.next_startup(now).map(alarm::project).unwrap_or(AlarmFields::DISABLED)
}

/// One control-loop tick: reconcile an alarm-fired-but-still-running race,
/// then reprogram both alarms from the current schedule state.
pub fn tick(
    hat: &mut dyn HardwareClock,
    sc: &ScheduleConfiguration,
    host: &mut dyn HostControl,
) -> anyhow::Result<()> {
    let now = hat.rtc_datetime()?;
    let reason = hat.action_reason()?;
    let active = sc.active(now);

    if reason.is_alarm_class() && active {
        warn!("{reason} fired but the schedule still calls for the host to be active; invoking host shutdown");
        host.shutdown_now()?;
    }

    hat.set_alarm1(startup_alarm(sc, now))?;

    let shutdown_alarm = if active {
        sc.next_shutdown(now).map(alarm::project).unwrap_or(AlarmFields::DISABLED)
    } else {
        alarm::project(now + INACTIVE_SHUTDOWN_DELAY)
    };
    hat.set_alarm2(shutdown_alarm)?;

    Ok(())
}

/// Runs once on a shutdown signal: clear the shutdown alarm (so it can't
/// fire and power us down mid-exit) and program the final startup alarm so
/// the HAT brings the host back up at the next scheduled moment.
pub fn terminate(hat: &mut dyn HardwareClock, sc: &ScheduleConfiguration) -> Result<(), HardwareError> {
    hat.set_alarm2(AlarmFields::DISABLED)?;
    let now = hat.rtc_datetime()?;
    hat.set_alarm1(startup_alarm(sc, now))
}

/// Should a freshly booted daemon synthesize a [`powerhat_core::ButtonEntry`]
/// for this wake reason?
pub fn should_inject_button_entry(reason: ActionReason) -> bool {
    reason.implies_button_entry()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use powerhat_core::{FakeHat, ScheduleDocument};
    use powerhat_core::config::ScheduleDocumentEntry;
    use std::collections::BTreeMap;

    use crate::host::RecordingHostControl;

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32) -> chrono::DateTime<chrono::Utc> {
        chrono::Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
    }

    fn sc_always_active() -> ScheduleConfiguration {
        let mut doc = ScheduleDocument::default();
        doc.force_on = true;
        ScheduleConfiguration::from_document(&doc, None)
    }

    #[test]
    fn configure_arms_default_on_and_clears_flags() {
        let mut hat = FakeHat::new(ActionReason::AlarmStartup, utc(2024, 1, 1, 0, 0));
        configure(&mut hat).unwrap();
        assert!(hat.default_on);
        assert_eq!(hat.default_on_delay, DEFAULT_ON_DELAY_SECONDS);
        assert_eq!(hat.power_cut_delay, POWER_CUT_DELAY_TENTHS);
        assert_eq!(hat.flags_cleared, 1);
    }

    #[test]
    fn tick_invokes_shutdown_when_alarm_fired_but_still_active() {
        let mut hat = FakeHat::new(ActionReason::LowVoltage, utc(2024, 1, 1, 12, 0));
        let sc = sc_always_active();
        let mut host = RecordingHostControl::default();
        tick(&mut hat, &sc, &mut host).unwrap();
        assert_eq!(host.invocations, 1);
    }

    #[test]
    fn tick_does_not_invoke_shutdown_for_normal_reason() {
        let mut hat = FakeHat::new(ActionReason::AlarmStartup, utc(2024, 1, 1, 12, 0));
        let sc = sc_always_active();
        let mut host = RecordingHostControl::default();
        tick(&mut hat, &sc, &mut host).unwrap();
        assert_eq!(host.invocations, 0);
    }

    #[test]
    fn tick_on_inactive_schedule_sets_short_shutdown_alarm() {
        let now = utc(2024, 1, 1, 3, 0);
        let mut hat = FakeHat::new(ActionReason::AlarmStartup, now);
        let mut doc = ScheduleDocument::default();
        doc.schedule.push(ScheduleDocumentEntry {
            name: "s1".to_string(),
            start: "00:00".to_string(),
            stop: "02:00".to_string(),
            extra: BTreeMap::new(),
        });
        let sc = ScheduleConfiguration::from_document(&doc, None);
        let mut host = RecordingHostControl::default();
        tick(&mut hat, &sc, &mut host).unwrap();

        let expected = alarm::project(now + INACTIVE_SHUTDOWN_DELAY);
        assert_eq!(hat.alarm2, expected);
    }

    #[test]
    fn terminate_disables_shutdown_alarm_and_sets_startup() {
        let now = utc(2024, 1, 1, 12, 0);
        let mut hat = FakeHat::new(ActionReason::Reboot, now);
        hat.alarm2 = alarm::project(now + Duration::minutes(5));
        let sc = sc_always_active();
        terminate(&mut hat, &sc).unwrap();
        assert!(hat.alarm2.is_disabled());
    }

    #[test]
    fn button_like_reasons_are_flagged_for_injection() {
        assert!(should_inject_button_entry(ActionReason::ButtonClick));
        assert!(!should_inject_button_entry(ActionReason::AlarmStartup));
    }
}
