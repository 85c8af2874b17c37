//! `powerhatctl`: a thin, direct reflection of the HAT driver, independent
//! of the daemon's schedule evaluator. Mirrors the way the teacher ships
//! its importer and emulator as separate binaries rather than folding
//! every concern into the main application.

mod cli;

use anyhow::Error;
use chrono::Duration;
use log::error;

use powerhat_core::{alarm, HardwareClock, I2cHat};

use cli::{AlarmSlot, Command, ParsedArgs};

fn main() -> std::process::ExitCode {
    match run() {
        Ok(()) => std::process::ExitCode::from(0),
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::from(1)
        }
    }
}

fn run() -> Result<(), Error> {
    let args = match cli::parse(&std::env::args().skip(1).collect::<Vec<_>>())? {
        ParsedArgs::Run(args) => args,
        ParsedArgs::Help(usage) => {
            println!("{usage}");
            return Ok(());
        }
    };

    env_logger::Builder::new().filter_level(args.verbosity).init();

    let mut hat = I2cHat::open(args.bus, args.addr, args.force)?;

    match args.command {
        Command::Status => print_status(&mut hat)?,
        Command::TestAlarm { seconds, which } => set_test_alarm(&mut hat, seconds, which)?,
    }

    Ok(())
}

/// Dumps every readable register, the way the original tool printed a
/// debug dump at startup.
fn print_status(hat: &mut I2cHat) -> Result<(), Error> {
    let firmware_id = hat.firmware_id()?;
    let reason = hat.action_reason()?;
    let now = hat.rtc_datetime()?;
    let voltage_in = hat.voltage_in()?;
    let voltage_out = hat.voltage_out()?;
    let temperature = hat.temperature()?;
    let alarm1 = hat.alarm1()?;
    let alarm2 = hat.alarm2()?;

    println!("firmware id:   {firmware_id:#04x}");
    println!("rtc time:      {now}");
    println!("action reason: {reason}");
    println!("voltage in:    {voltage_in:.2} V");
    println!("voltage out:   {voltage_out:.2} V");
    println!("temperature:   {temperature:.1} C");
    println!("alarm1 (startup):  {}", describe_alarm(alarm1, now));
    println!("alarm2 (shutdown): {}", describe_alarm(alarm2, now));

    Ok(())
}

fn describe_alarm(fields: powerhat_core::AlarmFields, rtc_now: chrono::DateTime<chrono::Utc>) -> String {
    if fields.is_disabled() {
        "disabled".to_string()
    } else {
        match alarm::reconstruct(fields, rtc_now) {
            Some(t) => t.to_string(),
            None => format!("{fields:?} (did not converge against rtc)"),
        }
    }
}

fn set_test_alarm(hat: &mut I2cHat, seconds: i64, which: AlarmSlot) -> Result<(), Error> {
    let now = hat.rtc_datetime()?;
    let target = now + Duration::seconds(seconds);
    let fields = alarm::project(target);

    match which {
        AlarmSlot::Startup => hat.set_alarm1(fields)?,
        AlarmSlot::Shutdown => hat.set_alarm2(fields)?,
    }

    let slot_name = match which {
        AlarmSlot::Startup => "startup",
        AlarmSlot::Shutdown => "shutdown",
    };
    println!("programmed {slot_name} alarm for {target}");

    Ok(())
}
