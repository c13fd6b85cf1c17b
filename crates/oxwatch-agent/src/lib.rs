//! The oxwatch monitor: loads configuration documents, owns the variables,
//! derivatives and incidents they describe, and runs the evaluation cycle
//! on a fixed interval.

pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;

#[cfg(test)]
mod tests;

pub use config::{ConfigDocument, LoadCounts};
pub use error::MonitorError;
pub use monitor::{CycleReport, Monitor, StopHandle};
