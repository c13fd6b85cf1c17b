//! Restricted expression language used by derivatives and level predicates.
//!
//! The grammar covers literals, names, arithmetic, chained comparisons,
//! boolean connectives, list indexing and a small set of pure functions
//! (see [`FUNCTIONS`]). Nothing in it can reach the environment, the
//! filesystem or a process.

mod eval;
mod lexer;
mod parser;

pub use eval::FUNCTIONS;

use crate::error::Result;
use oxwatch_common::types::{Scope, Value};

/// Parses and evaluates `src` against `scope`.
///
/// ```
/// use oxwatch_alert::expr::evaluate;
/// use oxwatch_common::types::{Context, Value};
///
/// let mut ctx = Context::new();
/// ctx.insert("load".into(), Value::Float(2.5));
/// assert_eq!(evaluate("0 < load <= 3", &ctx).unwrap(), Value::Bool(true));
/// ```
pub fn evaluate(src: &str, scope: &dyn Scope) -> Result<Value> {
    let tokens = lexer::tokenize(src)?;
    let expr = parser::Parser::new(src, tokens).parse()?;
    eval::Evaluator::new(src, scope).eval(&expr)
}
