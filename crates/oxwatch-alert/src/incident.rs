use crate::error::{ExprError, IncidentError};
use crate::level::Level;
use oxwatch_common::types::{scalar_params, Context, Overlay, Scope, SeverityOrder};

/// An escalation command produced by one level during one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escalation {
    pub severity: String,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IncidentOutcome {
    pub in_range: bool,
    /// Severity of the level that matched this cycle.
    pub severity: Option<String>,
    pub escalations: Vec<Escalation>,
}

/// A named alerting rule made of levels kept in severity order.
///
/// Each cycle the levels are evaluated from the highest priority down; the
/// first one in range wins and every lower level is cleared, so at most one
/// level of an incident is triggered at a time.
#[derive(Debug, Clone)]
pub struct Incident {
    name: String,
    description: String,
    params: Context,
    levels: Vec<Level>,
}

impl Incident {
    pub fn new(
        name: &str,
        spec: &serde_json::Value,
        order: &SeverityOrder,
    ) -> Result<Self, IncidentError> {
        let map = spec.as_object().ok_or_else(|| IncidentError::InvalidSpec {
            name: name.to_string(),
            reason: "incident spec must be a mapping".to_string(),
        })?;

        let description = match map.get("description") {
            Some(serde_json::Value::String(text)) => text.clone(),
            Some(serde_json::Value::Null) | None => {
                return Err(IncidentError::MissingDescription(name.to_string()))
            }
            Some(other) => other.to_string(),
        };

        let mut levels: Vec<Level> = Vec::new();
        let mut first_error = None;

        for severity in order.iter() {
            let Some(level_spec) = map.get(severity) else {
                continue;
            };
            match Level::new(name, severity, level_spec, levels.last()) {
                Ok(level) => levels.push(level),
                Err(e) => {
                    tracing::warn!(incident = name, level = severity, error = %e, "Level skipped");
                    first_error.get_or_insert(e);
                }
            }
        }

        if levels.is_empty() {
            return Err(match first_error {
                Some(e) => IncidentError::Level {
                    incident: name.to_string(),
                    source: Box::new(e),
                },
                None => IncidentError::NoLevels {
                    incident: name.to_string(),
                    levels: order.to_string(),
                },
            });
        }

        let mut params = scalar_params(map);
        params.retain(|key, _| !order.contains(key));

        tracing::debug!(
            incident = name,
            levels = levels.len(),
            "Incident constructed"
        );

        Ok(Self {
            name: name.to_string(),
            description,
            params,
            levels,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn params(&self) -> &Context {
        &self.params
    }

    /// Constructed levels, highest priority first.
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn level(&self, severity: &str) -> Option<&Level> {
        self.levels.iter().find(|l| l.severity() == severity)
    }

    /// Severity of the level currently triggered, if any.
    pub fn triggered(&self) -> Option<&str> {
        self.levels
            .iter()
            .find(|l| l.is_triggered())
            .map(Level::severity)
    }

    /// Evaluates every level against `scope` (incident parameters win) and
    /// collects the escalation commands produced this cycle.
    pub fn escalated(&mut self, scope: &dyn Scope) -> Result<IncidentOutcome, ExprError> {
        let scope = Overlay::new(&self.params, scope);
        let mut outcome = IncidentOutcome::default();

        for level in &mut self.levels {
            if outcome.in_range {
                level.clear();
                continue;
            }
            let result = level.escalate_if_in_range(&scope)?;
            if let Some(command) = result.escalation {
                outcome.escalations.push(Escalation {
                    severity: level.severity().to_string(),
                    command,
                });
            }
            if result.in_range {
                outcome.in_range = true;
                outcome.severity = Some(level.severity().to_string());
            }
        }

        Ok(outcome)
    }

    /// Checks every level's templates without changing any state.
    pub fn verify(&self, scope: &dyn Scope) -> Result<(), ExprError> {
        let scope = Overlay::new(&self.params, scope);
        self.levels.iter().try_for_each(|level| level.verify(&scope))
    }
}
