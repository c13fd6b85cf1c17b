use crate::error::Result;
use crate::source::VariableSpec;
use crate::ValueSource;
use oxwatch_common::types::{Context, Value};
use std::collections::VecDeque;

/// History depth used when a variable spec does not set one.
pub const DEFAULT_HISTORY_DEPTH: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// Fetched once when built, never refreshed.
    Constant,
    /// Refreshed at every evaluation cycle.
    Measured,
}

/// A named value bound to one source, with a bounded trailing history.
///
/// History holds past values oldest first and never grows beyond `depth`.
pub struct Variable {
    name: String,
    kind: VariableKind,
    source: Box<dyn ValueSource>,
    current: Value,
    history: VecDeque<Value>,
    depth: usize,
}

impl Variable {
    /// Builds the variable and fetches its initial value.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    pub fn new(
        name: &str,
        kind: VariableKind,
        mut source: Box<dyn ValueSource>,
        depth: i64,
    ) -> Result<Self> {
        let current = source.fetch()?;
        let depth = usize::try_from(depth).unwrap_or(0);
        tracing::debug!(
            name,
            source = source.kind(),
            id = source.identifier(),
            value = %current,
            "Variable fetched"
        );
        Ok(Self {
            name: name.to_string(),
            kind,
            source,
            current,
            history: VecDeque::with_capacity(depth),
            depth,
        })
    }

    pub fn from_spec(name: &str, kind: VariableKind, spec: &VariableSpec) -> Result<Self> {
        let source = spec.build_source()?;
        Self::new(
            name,
            kind,
            source,
            spec.history.unwrap_or(DEFAULT_HISTORY_DEPTH),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    pub fn source(&self) -> &dyn ValueSource {
        self.source.as_ref()
    }

    pub fn current(&self) -> &Value {
        &self.current
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn history(&self) -> &VecDeque<Value> {
        &self.history
    }

    /// Newest history entry.
    pub fn last(&self) -> Option<&Value> {
        self.history.back()
    }

    /// Oldest history entry.
    pub fn oldest(&self) -> Option<&Value> {
        self.history.front()
    }

    /// Fetches a new value, moving the previous one into history.
    ///
    /// Constants return their value untouched. A failed fetch leaves both
    /// the current value and the history as they were.
    pub fn refresh(&mut self) -> Result<&Value> {
        if self.kind == VariableKind::Constant {
            return Ok(&self.current);
        }

        let value = self.source.fetch()?;
        let previous = std::mem::replace(&mut self.current, value);
        if self.depth > 0 {
            if self.history.len() >= self.depth {
                self.history.pop_front();
            }
            self.history.push_back(previous);
        }
        Ok(&self.current)
    }

    /// Writes the current value and the history views into `context`.
    ///
    /// Besides `<name>` this adds `last_<name>`, `oldest_<name>` and
    /// `history_<name>` when history is kept.
    pub fn publish(&self, context: &mut Context) {
        context.insert(self.name.clone(), self.current.clone());
        if self.depth == 0 {
            return;
        }
        if let Some(last) = self.last() {
            context.insert(format!("last_{}", self.name), last.clone());
        }
        if let Some(oldest) = self.oldest() {
            context.insert(format!("oldest_{}", self.name), oldest.clone());
        }
        context.insert(
            format!("history_{}", self.name),
            Value::List(self.history.iter().cloned().collect()),
        );
    }
}
