use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A value produced by a source, a derivative or an expression.
///
/// # Examples
///
/// ```
/// use oxwatch_common::types::Value;
///
/// assert_eq!(Value::Float(2.0).to_string(), "2.0");
/// assert_eq!(Value::Str("FreeBSD".into()).to_string(), "FreeBSD");
/// assert!(!Value::Int(0).is_truthy());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    /// Converts a JSON value into a [`Value`]. `null` and objects have no
    /// counterpart and yield `None`.
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::Int(i)),
                None => n.as_f64().map(Value::Float),
            },
            serde_json::Value::String(s) => Some(Value::Str(s.clone())),
            serde_json::Value::Array(items) => items
                .iter()
                .map(Value::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            serde_json::Value::Null | serde_json::Value::Object(_) => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
        }
    }

    /// Numeric view of the value; booleans count as 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(_) | Value::List(_) => None,
        }
    }

    fn fmt_item(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            other => write!(f, "{other}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            // Debug keeps the fractional part so the text reads back as a float
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_item(f)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Mapping of every name known during one evaluation cycle.
pub type Context = HashMap<String, Value>;

/// Read-only name lookup used by templates and expressions.
pub trait Scope {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

impl Scope for Context {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// Two scopes layered on top of each other; names in `top` shadow `base`.
pub struct Overlay<'a> {
    top: &'a dyn Scope,
    base: &'a dyn Scope,
}

impl<'a> Overlay<'a> {
    pub fn new(top: &'a dyn Scope, base: &'a dyn Scope) -> Self {
        Self { top, base }
    }
}

impl Scope for Overlay<'_> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.top.lookup(name).or_else(|| self.base.lookup(name))
    }
}

/// Copies the string and number fields of a configuration mapping.
///
/// Booleans, arrays, objects and nulls are skipped; only scalars are usable
/// as template parameters.
///
/// # Examples
///
/// ```
/// use oxwatch_common::types::scalar_params;
///
/// let spec = serde_json::json!({"a": "A", "i": 1, "f": 3.14, "l": [], "d": {}, "n": null});
/// let params = scalar_params(spec.as_object().unwrap());
/// assert_eq!(params.len(), 3);
/// ```
pub fn scalar_params(spec: &serde_json::Map<String, serde_json::Value>) -> Context {
    spec.iter()
        .filter(|(_, v)| v.is_string() || v.is_number())
        .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
        .collect()
}

/// Ordered list of severity names, highest priority first.
///
/// # Examples
///
/// ```
/// use oxwatch_common::types::SeverityOrder;
///
/// let order = SeverityOrder::default();
/// assert_eq!(order.names(), ["error", "warn", "info"]);
/// assert!(SeverityOrder::new(vec!["a".into(), "a".into()]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityOrder {
    names: Vec<String>,
}

impl SeverityOrder {
    pub fn new(names: Vec<String>) -> Result<Self, String> {
        if names.is_empty() {
            return Err("at least one severity level is required".to_string());
        }
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err("severity level names must not be empty".to_string());
            }
            if names[..i].contains(name) {
                return Err(format!("duplicate severity level: {name}"));
            }
        }
        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

impl Default for SeverityOrder {
    fn default() -> Self {
        Self {
            names: vec!["error".to_string(), "warn".to_string(), "info".to_string()],
        }
    }
}

impl fmt::Display for SeverityOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names.join(", "))
    }
}
