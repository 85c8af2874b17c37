//! Command-line surface for the status/control tool: the same `--bus`/
//! `--addr` pair the daemon takes, plus a subcommand naming what to do.

use anyhow::{anyhow, Error};
use getopts::Options;
use log::LevelFilter;

pub enum Command {
    /// Dump every readable register, the RTC time, and the action reason.
    Status,
    /// Program a one-shot alarm `seconds` from now, for bring-up testing.
    TestAlarm { seconds: i64, which: AlarmSlot },
}

#[derive(Debug, Clone, Copy)]
pub enum AlarmSlot {
    Startup,
    Shutdown,
}

pub struct Args {
    pub bus: u8,
    pub addr: u16,
    pub force: bool,
    pub verbosity: LevelFilter,
    pub command: Command,
}

pub enum ParsedArgs {
    Run(Args),
    Help(String),
}

const USAGE: &str = "Usage: powerhatctl [options] status\n       powerhatctl [options] test-alarm SECONDS [--shutdown]";

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
    opts.optflag(
        "",
        "shutdown",
        "With test-alarm, program the shutdown alarm instead of the startup one.",
    );
    opts.optflagmulti("v", "", "Increase log verbosity; repeatable.");
    opts.optflag("h", "help", "Print this help message.");

    let matches = opts.parse(raw).map_err(|e| anyhow!("{e}"))?;

    if matches.opt_present("h") {
        return Ok(ParsedArgs::Help(opts.usage(USAGE)));
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
    let verbosity = match matches.opt_count("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    let free = &matches.free;
    let subcommand = free.first().ok_or_else(|| anyhow!("missing subcommand; expected 'status' or 'test-alarm'"))?;

    let command = match subcommand.as_str() {
        "status" => Command::Status,
        "test-alarm" => {
            let seconds_str = free.get(1).ok_or_else(|| anyhow!("test-alarm requires a SECONDS argument"))?;
            let seconds: i64 = seconds_str
                .parse()
                .map_err(|_| anyhow!("SECONDS must be an integer, got '{seconds_str}'"))?;
            let which = if matches.opt_present("shutdown") {
                AlarmSlot::Shutdown
            } else {
                AlarmSlot::Startup
            };
            Command::TestAlarm { seconds, which }
        }
        other => return Err(anyhow!("unknown subcommand '{other}'; expected 'status' or 'test-alarm'")),
    };

    Ok(ParsedArgs::Run(Args {
        bus,
        addr,
        force,
        verbosity,
        command,
    }))
}
