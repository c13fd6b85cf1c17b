//! Shared data model for the oxwatch crates: runtime values, evaluation
//! scopes and the configured severity order.

pub mod types;
