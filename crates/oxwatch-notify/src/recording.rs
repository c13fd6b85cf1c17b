use crate::ActionExecutor;
use anyhow::Result;
use std::sync::Mutex;

/// Keeps every command instead of running it.
///
/// # Examples
///
/// ```
/// use oxwatch_notify::{ActionExecutor, RecordingExecutor};
///
/// let executor = RecordingExecutor::default();
/// executor.execute("echo hello").unwrap();
/// assert_eq!(executor.commands(), ["echo hello"]);
/// ```
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    commands: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands received so far, oldest first.
    pub fn commands(&self) -> Vec<String> {
        match self.commands.lock() {
            Ok(commands) => commands.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn clear(&self) {
        match self.commands.lock() {
            Ok(mut commands) => commands.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl ActionExecutor for RecordingExecutor {
    fn name(&self) -> &str {
        "recording"
    }

    fn execute(&self, command: &str) -> Result<()> {
        tracing::info!(command, "Escalation recorded");
        self.commands
            .lock()
            .map_err(|_| anyhow::anyhow!("recording executor lock poisoned"))?
            .push(command.to_string());
        Ok(())
    }
}
