/// Errors raised while resolving a template or evaluating an expression.
///
/// Structural problems ([`ExprError::Malformed`]) and references to names
/// that are not in scope ([`ExprError::UnresolvedName`]) are kept apart so
/// that a configuration check can tell a syntax mistake from a misspelled
/// variable.
///
/// # Examples
///
/// ```rust
/// use oxwatch_alert::error::ExprError;
///
/// let err = ExprError::UnresolvedName { name: "cpus".into(), expr: "{cpus} > 1".into() };
/// assert!(err.is_unresolved_name());
/// assert!(!err.is_malformed());
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    /// The template or expression is structurally invalid.
    #[error("Expr: malformed expression '{expr}': {reason}")]
    Malformed { expr: String, reason: String },

    /// A placeholder or identifier names something that is not in scope.
    #[error("Expr: unresolved name '{name}' in '{expr}'")]
    UnresolvedName { name: String, expr: String },

    /// The expression is well formed but cannot be computed (type mismatch,
    /// division by zero, bad function arguments).
    #[error("Expr: cannot evaluate '{expr}': {reason}")]
    Evaluation { expr: String, reason: String },
}

impl ExprError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }

    pub fn is_unresolved_name(&self) -> bool {
        matches!(self, Self::UnresolvedName { .. })
    }

    pub(crate) fn malformed(expr: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unresolved(expr: &str, name: &str) -> Self {
        Self::UnresolvedName {
            name: name.to_string(),
            expr: expr.to_string(),
        }
    }

    pub(crate) fn evaluation(expr: &str, reason: impl Into<String>) -> Self {
        Self::Evaluation {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while building levels and incidents from configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IncidentError {
    /// The incident spec has no `description`.
    #[error("Alert: 'description' is missing in '{0}' incident")]
    MissingDescription(String),

    /// A level has no value for a template and nothing to inherit it from.
    #[error("Alert: '{field}' is missing in '{level}' level")]
    MissingField { level: String, field: &'static str },

    /// A level or incident spec is not a mapping, or a template is not a string.
    #[error("Alert: invalid spec for '{name}': {reason}")]
    InvalidSpec { name: String, reason: String },

    /// None of the configured severities is present in the incident spec.
    #[error("Alert: one or more of {levels} must be specified in '{incident}' incident")]
    NoLevels { incident: String, levels: String },

    /// Every configured level failed; this is the first failure.
    #[error("{source} of '{incident}' incident")]
    Level {
        incident: String,
        #[source]
        source: Box<IncidentError>,
    },
}

/// Convenience `Result` alias for expression evaluation.
pub type Result<T> = std::result::Result<T, ExprError>;
