use anyhow::Context;
use indexmap::IndexMap;
use oxwatch_collector::source::VariableSpec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One configuration document. Every section is optional and keeps the
/// declaration order of its entries.
///
/// ```json
/// {
///   "constants": {"ncpu": {"type": "sysctl", "sysctl": "hw.ncpu"}},
///   "variables": {"load": {"syscmd": "cut -d' ' -f1 /proc/loadavg", "history": 5}},
///   "derivatives": {"per_cpu": "{load} / {ncpu}"},
///   "incidents": {
///     "busy": {
///       "description": "load per cpu",
///       "warn": {"trigger": "{per_cpu} > 1", "untrigger": "{per_cpu} < 0.8",
///                "escalation": "logger '{description} is {per_cpu}'"}
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub constants: IndexMap<String, VariableSpec>,
    #[serde(default)]
    pub variables: IndexMap<String, VariableSpec>,
    /// Derivative name to template expression.
    #[serde(default)]
    pub derivatives: IndexMap<String, String>,
    /// Incident specs are kept as raw mappings; levels are built from them
    /// against the monitor's severity order.
    #[serde(default)]
    pub incidents: IndexMap<String, serde_json::Value>,
}

impl ConfigDocument {
    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("invalid JSON configuration")
    }

    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid TOML configuration")
    }

    /// Reads a document from disk. Files ending in `.toml` are parsed as
    /// TOML, anything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let document = if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        };
        document.with_context(|| format!("failed to parse configuration {}", path.display()))
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
            && self.variables.is_empty()
            && self.derivatives.is_empty()
            && self.incidents.is_empty()
    }
}

/// Number of items of each section added by one document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadCounts {
    pub constants: usize,
    pub variables: usize,
    pub derivatives: usize,
    pub incidents: usize,
}
