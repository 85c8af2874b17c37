//! Invoking the host's own shutdown command. Kept behind a trait so the
//! control loop's reconciliation path (§4.6: "alarm fired but still
//! running") can be exercised in tests without actually shutting anything
//! down, the same seam [`powerhat_core::HardwareClock`] gives the HAT.

use std::process::Command;

use anyhow::{Context, Error};
use log::info;

pub trait HostControl {
    fn shutdown_now(&mut self) -> Result<(), Error>;
}

/// Shells out to `shutdown -h now`.
pub struct SystemHostControl;

impl HostControl for SystemHostControl {
    fn shutdown_now(&mut self) -> Result<(), Error> {
        info!("invoking host shutdown command");
        let status = Command::new("shutdown")
            .arg("-h")
            .arg("now")
            .status()
            .context("failed to spawn shutdown command")?;
        if !status.success() {
            anyhow::bail!("shutdown command exited with {status}");
        }
        Ok(())
    }
}

/// Records invocations instead of acting on them.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingHostControl {
    pub invocations: usize,
}

#[cfg(test)]
impl HostControl for RecordingHostControl {
    fn shutdown_now(&mut self) -> Result<(), Error> {
        self.invocations += 1;
        Ok(())
    }
}
