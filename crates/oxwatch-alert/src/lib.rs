//! Evaluation engine: templates, the expression language, and the
//! incident/level state machines that decide when to escalate.
//!
//! An [`incident::Incident`] owns one [`level::Level`] per configured
//! severity. Levels never run commands themselves; they hand back the
//! interpolated escalation text and the caller decides how to execute it.

pub mod error;
pub mod expr;
pub mod incident;
pub mod level;
pub mod template;


pub use incident::{Escalation, Incident, IncidentOutcome};
pub use level::{Level, LevelOutcome};
pub use template::Template;
