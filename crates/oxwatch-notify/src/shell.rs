use crate::ActionExecutor;
use anyhow::{Context, Result};
use std::process::{Command, Stdio};

/// Fire-and-forget `sh -c <command>`.
///
/// The child inherits stdout and stderr. A detached reaper thread waits for
/// it so no zombie is left behind, and logs the exit status.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor {
    shell: String,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::with_shell("sh")
    }

    /// Uses `shell` (invoked as `<shell> -c <command>`) instead of `sh`.
    pub fn with_shell(shell: &str) -> Self {
        Self {
            shell: shell.to_string(),
        }
    }
}

impl ActionExecutor for ShellExecutor {
    fn name(&self) -> &str {
        "shell"
    }

    fn execute(&self, command: &str) -> Result<()> {
        let shell = if self.shell.is_empty() { "sh" } else { &self.shell };
        let mut child = Command::new(shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn escalation command: {command}"))?;

        tracing::info!(pid = child.id(), command, "Escalation started");

        let command = command.to_string();
        std::thread::Builder::new()
            .name("oxwatch-reaper".into())
            .spawn(move || match child.wait() {
                Ok(status) if status.success() => {
                    tracing::debug!(command = %command, "Escalation finished");
                }
                Ok(status) => {
                    tracing::warn!(command = %command, %status, "Escalation exited unsuccessfully");
                }
                Err(e) => {
                    tracing::warn!(command = %command, error = %e, "Failed to wait for escalation");
                }
            })
            .context("failed to start escalation reaper thread")?;

        Ok(())
    }
}
