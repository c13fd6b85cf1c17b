use crate::command::CommandSource;
use crate::counter::CounterSource;
use crate::error::{Result, SourceError};
use crate::ValueSource;
use oxwatch_common::types::Value;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The closed set of source kinds a variable can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Counter,
    Command,
    Literal,
}

impl FromStr for SourceKind {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sysctl" => Ok(Self::Counter),
            "syscmd" => Ok(Self::Command),
            "value" => Ok(Self::Literal),
            _ => Err(SourceError::InvalidSpec(format!("unknown variable type '{s}'"))),
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Counter => write!(f, "sysctl"),
            Self::Command => write!(f, "syscmd"),
            Self::Literal => write!(f, "value"),
        }
    }
}

/// A fixed value taken verbatim from configuration.
pub struct LiteralSource {
    value: Value,
    text: String,
}

impl LiteralSource {
    pub fn new(value: Value) -> Self {
        let text = value.to_string();
        Self { value, text }
    }
}

impl ValueSource for LiteralSource {
    fn kind(&self) -> &str {
        "value"
    }

    fn identifier(&self) -> &str {
        &self.text
    }

    fn fetch(&mut self) -> Result<Value> {
        Ok(self.value.clone())
    }
}

/// Configuration of one constant or variable.
///
/// ```json
/// { "type": "sysctl", "sysctl": "hw.ncpu", "history": 3 }
/// ```
///
/// When `type` is omitted the kind is inferred from whichever of `sysctl`,
/// `syscmd` or `value` is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sysctl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syscmd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Number of past values to keep; zero or negative disables history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<i64>,
}

impl VariableSpec {
    pub fn source_kind(&self) -> Result<SourceKind> {
        if let Some(kind) = &self.kind {
            return kind.parse();
        }
        if self.sysctl.is_some() {
            Ok(SourceKind::Counter)
        } else if self.syscmd.is_some() {
            Ok(SourceKind::Command)
        } else if self.value.is_some() {
            Ok(SourceKind::Literal)
        } else {
            Err(SourceError::InvalidSpec("unknown variable type".to_string()))
        }
    }

    /// Builds the source described by this spec.
    pub fn build_source(&self) -> Result<Box<dyn ValueSource>> {
        let kind = self.source_kind()?;
        let missing = || SourceError::InvalidSpec(format!("'{kind}' is missing"));
        let source: Box<dyn ValueSource> = match kind {
            SourceKind::Counter => {
                let name = self.sysctl.as_deref().ok_or_else(missing)?;
                Box::new(CounterSource::new(name)?)
            }
            SourceKind::Command => {
                let command = self.syscmd.as_deref().ok_or_else(missing)?;
                Box::new(CommandSource::new(command))
            }
            SourceKind::Literal => {
                let value = self.value.clone().ok_or_else(missing)?;
                Box::new(LiteralSource::new(value))
            }
        };
        Ok(source)
    }
}
