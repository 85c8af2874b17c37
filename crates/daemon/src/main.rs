mod app;
mod cli;
mod control;
mod host;
mod uptime;

use std::process::ExitCode;

fn main() -> ExitCode {
    match app::run() {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            eprintln!("powerhatd: {e:#}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
