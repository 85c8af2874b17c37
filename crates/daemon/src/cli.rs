//! Command-line surface shared in spirit with the status/control CLI: bus,
//! address, I2C force-bind, schedule path, and repeatable verbosity.

use std::path::PathBuf;

use anyhow::{anyhow, Error};
use getopts::Options;
use log::LevelFilter;

pub struct Args {
    pub bus: u8,
    pub addr: u16,
    /// I2C bus-access force flag, passed straight through to
    /// [`powerhat_core::hat::I2cHat::open`]. Unrelated to
    /// `ScheduleConfiguration::force_on`, which comes only from the YAML
    /// document.
    pub force: bool,
    pub schedule_path: PathBuf,
    pub verbosity: LevelFilter,
}

pub enum ParsedArgs {
    Run(Args),
    Help(String),
}

pub fn parse(raw: &[String]) -> Result<ParsedArgs, Error> {
    let mut opts = Options::new();
    opts.optopt("", "bus", "I2C bus number (default 1).", "BUS");
    opts.optopt("", "addr", "I2C slave address (default 8).", "ADDR");
    opts.optflag(
        "",
        "force",
        "Force I2C bus access, required when a kernel RTC driver already claims the address (default).",
    );
    opts.optflag("", "no-force", "Bind the I2C slave address normally.");
    opts.optopt("s", "schedule", "Path to the schedule document (default schedule.yml).", "PATH");
    opts.optflagmulti("v", "", "Increase log verbosity; repeatable.");
    opts.optflag("h", "help", "Print this help message.");

    let matches = opts.parse(raw).map_err(|e| anyhow!("{e}"))?;

    if matches.opt_present("h") {
        return Ok(ParsedArgs::Help(opts.usage("Usage: powerhatd [options]")));
    }

    let bus = match matches.opt_str("bus") {
        Some(s) => s.parse().map_err(|_| anyhow!("--bus must be an integer, got '{s}'"))?,
        None => 1,
    };
    let addr = match matches.opt_str("addr") {
        Some(s) => s.parse().map_err(|_| anyhow!("--addr must be an integer, got '{s}'"))?,
        None => 8,
    };

    let force = !matches.opt_present("no-force");

    let schedule_path = matches
        .opt_str("schedule")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("schedule.yml"));

    let verbosity = match matches.opt_count("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    Ok(ParsedArgs::Run(Args {
        bus,
        addr,
        force,
        schedule_path,
        verbosity,
    }))
}
