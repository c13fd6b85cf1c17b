use crate::error::{ExprError, IncidentError};
use crate::template::Template;
use oxwatch_common::types::{scalar_params, Context, Overlay, Scope, Value};

/// Result of evaluating one level for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LevelOutcome {
    /// The level's condition holds: it triggered now, stays triggered, or
    /// sits in the dead band between trigger and untrigger.
    pub in_range: bool,
    /// Interpolated escalation command, only on the idle → triggered edge.
    pub escalation: Option<String>,
}

/// One severity of an incident: a trigger/untrigger pair with hysteresis.
///
/// A level starts idle. A truthy trigger moves it to triggered and yields
/// the escalation command exactly once. It only returns to idle when its
/// untrigger holds; a falsy trigger on its own keeps it triggered.
#[derive(Debug, Clone)]
pub struct Level {
    incident: String,
    severity: String,
    trigger: Template,
    untrigger: Template,
    escalation: Template,
    params: Context,
    triggered: bool,
}

impl Level {
    /// Builds a level from its configuration mapping.
    ///
    /// `trigger`, `untrigger` and `escalation` that are absent from `spec`
    /// are taken from `fallback`, the nearest higher priority level of the
    /// same incident.
    pub fn new(
        incident: &str,
        severity: &str,
        spec: &serde_json::Value,
        fallback: Option<&Level>,
    ) -> Result<Self, IncidentError> {
        let map = spec.as_object().ok_or_else(|| IncidentError::InvalidSpec {
            name: severity.to_string(),
            reason: "level spec must be a mapping".to_string(),
        })?;

        let field = |key: &'static str, inherited: Option<&Template>| -> Result<Template, IncidentError> {
            match map.get(key) {
                Some(serde_json::Value::String(text)) => Ok(Template::new(text.as_str())),
                Some(_) => Err(IncidentError::InvalidSpec {
                    name: severity.to_string(),
                    reason: format!("'{key}' must be a string"),
                }),
                None => inherited.cloned().ok_or_else(|| IncidentError::MissingField {
                    level: severity.to_string(),
                    field: key,
                }),
            }
        };

        let trigger = field("trigger", fallback.map(|l| &l.trigger))?;
        let untrigger = field("untrigger", fallback.map(|l| &l.untrigger))?;
        let escalation = field("escalation", fallback.map(|l| &l.escalation))?;

        let mut params = scalar_params(map);
        params.insert("level".to_string(), Value::from(severity));
        params.insert("trigger".to_string(), Value::from(trigger.as_str()));
        params.insert("untrigger".to_string(), Value::from(untrigger.as_str()));
        params.insert("escalation".to_string(), Value::from(escalation.as_str()));

        Ok(Self {
            incident: incident.to_string(),
            severity: severity.to_string(),
            trigger,
            untrigger,
            escalation,
            params,
            triggered: false,
        })
    }

    pub fn severity(&self) -> &str {
        &self.severity
    }

    pub fn incident(&self) -> &str {
        &self.incident
    }

    pub fn trigger(&self) -> &Template {
        &self.trigger
    }

    pub fn untrigger(&self) -> &Template {
        &self.untrigger
    }

    pub fn escalation(&self) -> &Template {
        &self.escalation
    }

    /// Level parameters: scalar spec fields plus `level` and the three
    /// template texts.
    pub fn params(&self) -> &Context {
        &self.params
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    /// Evaluates the level against `scope` (level parameters win) and
    /// advances its state.
    pub fn escalate_if_in_range(&mut self, scope: &dyn Scope) -> Result<LevelOutcome, ExprError> {
        let scope = Overlay::new(&self.params, scope);

        if self.trigger.resolve(&scope)?.is_truthy() {
            if self.triggered {
                return Ok(LevelOutcome {
                    in_range: true,
                    escalation: None,
                });
            }
            let command = self.escalation.interpolate(&scope)?;
            self.triggered = true;
            tracing::info!(
                incident = %self.incident,
                level = %self.severity,
                trigger = %self.trigger,
                "Level triggered"
            );
            return Ok(LevelOutcome {
                in_range: true,
                escalation: Some(command),
            });
        }

        if !self.triggered {
            return Ok(LevelOutcome::default());
        }

        if self.untrigger.resolve(&scope)?.is_truthy() {
            self.triggered = false;
            tracing::info!(
                incident = %self.incident,
                level = %self.severity,
                untrigger = %self.untrigger,
                "Level untriggered"
            );
            return Ok(LevelOutcome::default());
        }

        tracing::debug!(incident = %self.incident, level = %self.severity, "Level still triggered");
        Ok(LevelOutcome {
            in_range: true,
            escalation: None,
        })
    }

    /// Forces the level back to idle without evaluating anything.
    pub fn clear(&mut self) {
        if self.triggered {
            tracing::debug!(incident = %self.incident, level = %self.severity, "Level cleared");
        }
        self.triggered = false;
    }

    /// Resolves both predicates and interpolates the escalation without
    /// touching the level's state.
    pub fn verify(&self, scope: &dyn Scope) -> Result<(), ExprError> {
        let scope = Overlay::new(&self.params, scope);
        let trigger = self.trigger.resolve(&scope)?;
        let untrigger = self.untrigger.resolve(&scope)?;
        let escalation = self.escalation.interpolate(&scope)?;
        tracing::debug!(
            incident = %self.incident,
            level = %self.severity,
            %trigger,
            %untrigger,
            %escalation,
            "Level verified"
        );
        Ok(())
    }
}
