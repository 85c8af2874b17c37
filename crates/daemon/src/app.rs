//! Boot sequence and control loop (§4.6): validate the clock, configure the
//! HAT, load the schedule, then tick once a minute until a signal asks the
//! daemon to terminate.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Context;
use chrono::Utc;
use log::{error, info, warn};

use powerhat_core::{clock_trust, config, ClockSources, DaemonError, HardwareClock, I2cHat, ScheduleConfiguration};

use crate::cli::{self, Args, ParsedArgs};
use crate::control;
use crate::host::{HostControl, SystemHostControl};
use crate::uptime;

const TICK_PERIOD: StdDuration = StdDuration::from_secs(60);
const TICK_POLL_INTERVAL: StdDuration = StdDuration::from_millis(200);
const GEOLOCATION_FALLBACK_PATH: &str = "/etc/geolocation";

pub fn run() -> Result<(), DaemonError> {
    let args = match cli::parse(&std::env::args().collect::<Vec<_>>())? {
        ParsedArgs::Run(args) => args,
        ParsedArgs::Help(usage) => {
            println!("{usage}");
            return Ok(());
        }
    };

    env_logger::Builder::new().filter_level(args.verbosity).init();

    let mut hat =
        I2cHat::open(args.bus, args.addr, args.force).inspect_err(|e| error!("could not initialize HAT: {e}"))?;

    validate_clock(&mut hat)?;

    control::configure(&mut hat).inspect_err(|e| error!("could not apply boot configuration to HAT: {e}"))?;

    let mut sc = load_schedule(&args).inspect_err(|e| error!("could not load schedule configuration: {e}"))?;

    let reason = hat.action_reason()?;
    info!("boot reason: {reason}");
    if control::should_inject_button_entry(reason) {
        let rtc_now = hat.rtc_datetime()?;
        let boot_instant = uptime::boot_instant(rtc_now);
        info!("injecting button entry at {boot_instant}");
        sc.inject_button_entry(boot_instant);
    }

    let terminate_flag = Arc::new(AtomicBool::new(false));
    install_signal_handlers(&terminate_flag)?;

    let mut host: Box<dyn HostControl> = Box::new(SystemHostControl);

    info!("entering control loop");
    while !terminate_flag.load(Ordering::Relaxed) {
        if let Err(e) = control::tick(&mut hat, &sc, host.as_mut()) {
            warn!("tick failed, will retry next cycle: {e:#}");
        }
        wait_or_terminate(&terminate_flag);
    }

    info!("shutdown signal received, programming final alarms");
    control::terminate(&mut hat, &sc)?;

    Ok(())
}

fn install_signal_handlers(terminate_flag: &Arc<AtomicBool>) -> anyhow::Result<()> {
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(terminate_flag))
        .context("could not install SIGINT handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(terminate_flag))
        .context("could not install SIGTERM handler")?;
    Ok(())
}

/// Sleep for one tick period in short slices so a signal is noticed within
/// [`TICK_POLL_INTERVAL`] rather than blocking for the whole minute.
fn wait_or_terminate(terminate_flag: &AtomicBool) {
    let mut waited = StdDuration::ZERO;
    while waited < TICK_PERIOD {
        if terminate_flag.load(Ordering::Relaxed) {
            return;
        }
        std::thread::sleep(TICK_POLL_INTERVAL);
        waited += TICK_POLL_INTERVAL;
    }
}

fn validate_clock(hat: &mut I2cHat) -> Result<(), DaemonError> {
    let rtc_now = hat.rtc_datetime()?;
    let system_now = Utc::now();
    let sources = ClockSources::default();
    match clock_trust::check(&sources, rtc_now, system_now) {
        Ok(()) => {
            info!("rtc {rtc_now} validated against system clock");
            Ok(())
        }
        Err(e) => {
            error!("rtc is not trustworthy: {e}");
            Err(DaemonError::ClockTrust(e))
        }
    }
}

fn load_schedule(args: &Args) -> anyhow::Result<ScheduleConfiguration> {
    let doc = config::load_schedule_document(&args.schedule_path)?;
    let geolocation = config::load_geolocation(Path::new(GEOLOCATION_FALLBACK_PATH));
    Ok(ScheduleConfiguration::from_document(&doc, geolocation))
}
