//! Escalation side effects.
//!
//! The evaluation engine hands every escalation command to an
//! [`ActionExecutor`]. [`shell::ShellExecutor`] runs it through `sh -c`
//! without waiting for it; [`recording::RecordingExecutor`] only keeps it,
//! for dry runs and tests.

pub mod recording;
pub mod shell;

#[cfg(test)]
mod tests;

use anyhow::Result;

pub use recording::RecordingExecutor;
pub use shell::ShellExecutor;

/// Runs the command line produced by an escalating level.
///
/// Implementations must not block the caller on the command's completion.
/// Errors are reported to the caller, which logs them; they never affect
/// the state of the incident that produced the command.
pub trait ActionExecutor: Send + Sync {
    /// Executor name used in logs (e.g., `"shell"`).
    fn name(&self) -> &str;

    /// Starts `command`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command could not be started at all.
    fn execute(&self, command: &str) -> Result<()>;
}
