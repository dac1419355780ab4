//! Repair strategies for the container runtime, cheapest first.

use std::path::PathBuf;

use anyhow::{bail, Context};
use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ahab_fixer::Remedy;

/// Marker watched by reboot coordinators such as kured.
pub const REBOOT_SENTINEL: &str = "/var/run/reboot-required";

/// Restart a systemd unit through `systemctl`.
///
/// Talks to systemd over the bind-mounted system bus socket, so the
/// daemon's container needs `/var/run/dbus/system_bus_socket`.
#[derive(Debug, Clone)]
pub struct SystemdRestart {
    name: String,
    unit: String,
    program: PathBuf,
}

impl SystemdRestart {
    pub fn new(unit: impl Into<String>) -> Self {
        Self::with_program(unit, "systemctl")
    }

    /// Use a specific `systemctl` binary.
    pub fn with_program(unit: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        let unit = unit.into();
        Self {
            name: format!("restart {unit}"),
            unit,
            program: program.into(),
        }
    }
}

#[async_trait]
impl Remedy for SystemdRestart {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, cancel: &CancellationToken) -> anyhow::Result<()> {
        warn!(unit = %self.unit, "restarting service");
        let cmd = self.program.display().to_string();
        info!(%cmd, unit = %self.unit, "systemctl restart");

        let mut command = Command::new(&self.program);
        command.arg("restart").arg(&self.unit).kill_on_drop(true);
        let child = command.output();

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => bail!("restart of {} cancelled", self.unit),
            out = child => out.with_context(|| format!("spawn {cmd}"))?,
        };

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            info!(%cmd, std = "out", "{line}");
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            warn!(%cmd, std = "err", "{line}");
        }

        if !output.status.success() {
            bail!("couldn't restart {} - {}", self.unit, output.status);
        }

        info!(unit = %self.unit, "done restarting service");
        Ok(())
    }
}

/// Ask for a node reboot by writing the reboot-required marker.
#[derive(Debug, Clone)]
pub struct RebootSentinel {
    path: PathBuf,
    reason: String,
}

impl RebootSentinel {
    pub fn new(reason: impl Into<String>) -> Self {
        Self::at(REBOOT_SENTINEL, reason)
    }

    pub fn at(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }

    fn contents(&self) -> String {
        format!("*** System restart required (reason:{}) ***", self.reason)
    }
}

#[async_trait]
impl Remedy for RebootSentinel {
    fn name(&self) -> &str {
        "request reboot"
    }

    async fn apply(&self, _cancel: &CancellationToken) -> anyhow::Result<()> {
        warn!(reason = %self.reason, "node requires reboot");

        if tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            info!(path = %self.path.display(), "node is already scheduled for reboot");
            return Ok(());
        }

        tokio::fs::write(&self.path, self.contents())
            .await
            .with_context(|| format!("write reboot sentinel {}", self.path.display()))?;
        info!(path = %self.path.display(), "reboot sentinel written");
        Ok(())
    }
}
