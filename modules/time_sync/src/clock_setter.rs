// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use async_trait::async_trait;
use std::{path::PathBuf, time::Duration};
use tokio::{process::Command, time::timeout};
use tracing::{debug, warn};

/// Result of one attempt to set the system clock.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrectionOutcome {
    pub ok: bool,
    /// Output of the correction, reported in the time sync status.
    pub message: String,
}

/// The capability to set the system clock.
#[async_trait]
pub trait ClockSetter: Send + Sync {
    /// Sets the system clock to `epoch_sec` seconds since the Unix epoch.
    async fn set_time(&mut self, epoch_sec: i64) -> CorrectionOutcome;
}

/// Sets the clock by running `<program> -u -s @<epoch>`, i.e. `date`.
///
/// A command that does not finish within the timeout is killed and counts as failure.
#[derive(Clone, Debug)]
pub struct DateCommand {
    program: PathBuf,
    timeout: Duration,
}

impl DateCommand {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        DateCommand {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ClockSetter for DateCommand {
    async fn set_time(&mut self, epoch_sec: i64) -> CorrectionOutcome {
        let output = Command::new(&self.program)
            .arg("-u")
            .arg("-s")
            .arg(format!("@{epoch_sec}"))
            .kill_on_drop(true)
            .output();
        let outcome = match timeout(self.timeout, output).await {
            Err(_) => CorrectionOutcome {
                ok: false,
                message: format!(
                    "{} did not finish within {:?}",
                    self.program.display(),
                    self.timeout
                ),
            },
            Ok(Err(e)) => CorrectionOutcome {
                ok: false,
                message: format!("failed to run {}: {e}", self.program.display()),
            },
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let message = match stdout.trim() {
                    "" => String::from_utf8_lossy(&output.stderr).trim().to_owned(),
                    stdout => stdout.to_owned(),
                };
                CorrectionOutcome {
                    ok: output.status.success(),
                    message,
                }
            }
        };
        if outcome.ok {
            debug!("System clock set to @{epoch_sec}");
        } else {
            warn!("Setting system clock to @{epoch_sec} failed: {}", outcome.message);
        }
        outcome
    }
}
