//! Value acquisition for the oxwatch monitor.
//!
//! Each [`ValueSource`] implementation reads one named value from the host
//! (a kernel counter, the output of a shell command, or a literal) and a
//! [`variable::Variable`] wraps a source together with its bounded history.

pub mod command;
pub mod counter;
pub mod error;
pub mod source;
pub mod variable;


use error::Result;
use oxwatch_common::types::Value;

/// A source of values for one variable.
///
/// Sources are built once from configuration and called at every
/// evaluation cycle by the variable that owns them. Fetching may block on a
/// syscall or a subprocess; it never runs concurrently with another fetch.
pub trait ValueSource: Send {
    /// Returns the source kind as written in configuration (e.g., `"sysctl"`).
    fn kind(&self) -> &str;

    /// Returns the identifier this source reads (counter name, command line).
    fn identifier(&self) -> &str;

    /// Reads the current value.
    ///
    /// # Errors
    ///
    /// Returns an error only when the source cannot be reached at all; a
    /// command that exits non-zero still yields a (possibly empty) value.
    fn fetch(&mut self) -> Result<Value>;
}
