use oxwatch_alert::error::{ExprError, IncidentError};
use oxwatch_collector::error::SourceError;

/// Errors raised while configuring or running a [`crate::monitor::Monitor`].
///
/// # Examples
///
/// ```rust
/// use oxwatch_agent::error::MonitorError;
///
/// let err = MonitorError::DuplicateName("ncpu".to_string());
/// assert_eq!(err.to_string(), "Monitor: variable 'ncpu' already exists");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// A constant, variable or derivative with this name is already defined.
    #[error("Monitor: variable '{0}' already exists")]
    DuplicateName(String),

    /// The name is one the monitor generates for `owner` (`last_<owner>`,
    /// `oldest_<owner>`, `history_<owner>`).
    #[error("Monitor: name '{name}' is generated for '{owner}'")]
    ReservedName { name: String, owner: String },

    #[error("Monitor: incident '{0}' already exists")]
    DuplicateIncident(String),

    /// A variable could not be built from its spec or its initial fetch failed.
    #[error("Monitor: cannot configure variable '{name}': {source}")]
    Variable {
        name: String,
        #[source]
        source: SourceError,
    },

    #[error("Monitor: {0}")]
    Incident(#[from] IncidentError),

    /// A variable could not be refreshed during a cycle.
    #[error("Monitor: cannot refresh variable '{name}': {source}")]
    Source {
        name: String,
        #[source]
        source: SourceError,
    },

    /// A derivative or an incident template failed to resolve.
    #[error("Monitor: cannot evaluate '{name}': {source}")]
    Expression {
        name: String,
        #[source]
        source: ExprError,
    },

    #[error("Monitor: invalid interval {0}")]
    InvalidInterval(f64),

    /// The blocking worker running a cycle panicked or was cancelled.
    #[error("Monitor: cycle worker failed: {0}")]
    Worker(String),
}

impl MonitorError {
    /// The expression error behind an `Expression` failure, to tell a
    /// malformed template from an unknown name.
    pub fn expr_error(&self) -> Option<&ExprError> {
        match self {
            Self::Expression { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Convenience `Result` alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;
