use crate::error::{Result, SourceError};
use crate::ValueSource;
use oxwatch_common::types::Value;
use std::process::{Command, Stdio};

/// Captures the trimmed standard output of a shell command line.
pub struct CommandSource {
    command: String,
}

impl CommandSource {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
        }
    }
}

impl ValueSource for CommandSource {
    fn kind(&self) -> &str {
        "syscmd"
    }

    fn identifier(&self) -> &str {
        &self.command
    }

    fn fetch(&mut self) -> Result<Value> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|source| SourceError::Command {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            tracing::debug!(
                command = %self.command,
                status = %output.status,
                "Command exited unsuccessfully"
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(Value::Str(stdout.trim().to_string()))
    }
}
