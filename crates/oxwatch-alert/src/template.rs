use crate::error::{ExprError, Result};
use crate::expr;
use oxwatch_common::types::{Scope, Value};
use std::fmt;

/// A `{name}` template, resolved in two phases: placeholders are replaced by
/// the string form of their value, then the resulting text is evaluated as
/// an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template(String);

impl Template {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Phase one only.
    pub fn interpolate(&self, scope: &dyn Scope) -> Result<String> {
        interpolate(&self.0, scope)
    }

    /// Both phases.
    pub fn resolve(&self, scope: &dyn Scope) -> Result<Value> {
        resolve(&self.0, scope)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Template {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// Replaces every `{name}` in `template` with the string form of `name`.
///
/// `{{` and `}}` produce literal braces.
///
/// ```
/// use oxwatch_alert::template::interpolate;
/// use oxwatch_common::types::{Context, Value};
///
/// let mut ctx = Context::new();
/// ctx.insert("ncpu".into(), Value::Int(4));
/// assert_eq!(interpolate("echo {ncpu} {{x}}", &ctx).unwrap(), "echo 4 {x}");
/// assert!(interpolate("echo {ncpu", &ctx).unwrap_err().is_malformed());
/// assert!(interpolate("echo {cpus}", &ctx).unwrap_err().is_unresolved_name());
/// ```
pub fn interpolate(template: &str, scope: &dyn Scope) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(ExprError::malformed(template, "single '}' encountered")),
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if !closed {
                    return Err(ExprError::malformed(template, "expected '}' before end of string"));
                }
                if !is_identifier(&name) {
                    return Err(ExprError::malformed(
                        template,
                        format!("invalid placeholder '{{{name}}}'"),
                    ));
                }
                let value = scope
                    .lookup(&name)
                    .ok_or_else(|| ExprError::unresolved(template, &name))?;
                out.push_str(&value.to_string());
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Interpolates `template` and evaluates the result against the same scope.
pub fn resolve(template: &str, scope: &dyn Scope) -> Result<Value> {
    let text = interpolate(template, scope)?;
    expr::evaluate(&text, scope)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}
