use super::parser::{BinaryOp, CompareOp, Expr};
use crate::error::{ExprError, Result};
use oxwatch_common::types::{Scope, Value};
use std::cmp::Ordering;

/// Functions callable from expressions. Anything else is an unresolved name.
pub const FUNCTIONS: [&str; 4] = ["abs", "len", "max", "min"];

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Num::Int(i64::from(*b))),
            Value::Int(i) => Some(Num::Int(*i)),
            Value::Float(f) => Some(Num::Float(*f)),
            Value::Str(_) | Value::List(_) => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

pub(crate) struct Evaluator<'a> {
    src: &'a str,
    scope: &'a dyn Scope,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(src: &'a str, scope: &'a dyn Scope) -> Self {
        Self { src, scope }
    }

    fn fail(&self, reason: impl Into<String>) -> ExprError {
        ExprError::evaluation(self.src, reason)
    }

    pub(crate) fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Name(name) => self
                .scope
                .lookup(name)
                .cloned()
                .ok_or_else(|| ExprError::unresolved(self.src, name)),
            Expr::List(items) => Ok(Value::List(
                items.iter().map(|item| self.eval(item)).collect::<Result<_>>()?,
            )),
            Expr::Neg(inner) => match Num::of(&self.eval(inner)?) {
                Some(Num::Int(i)) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| self.fail("integer overflow")),
                Some(Num::Float(f)) => Ok(Value::Float(-f)),
                None => Err(self.fail("bad operand type for unary -")),
            },
            Expr::Pos(inner) => match Num::of(&self.eval(inner)?) {
                Some(Num::Int(i)) => Ok(Value::Int(i)),
                Some(Num::Float(f)) => Ok(Value::Float(f)),
                None => Err(self.fail("bad operand type for unary +")),
            },
            Expr::Not(inner) => Ok(Value::Bool(!self.eval(inner)?.is_truthy())),
            Expr::And(left, right) => {
                if !self.eval(left)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval(right)?.is_truthy()))
            }
            Expr::Or(left, right) => {
                if self.eval(left)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval(right)?.is_truthy()))
            }
            Expr::Compare(first, rest) => {
                let mut left = self.eval(first)?;
                for (op, operand) in rest {
                    let right = self.eval(operand)?;
                    if !self.compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary(*op, &left, &right)
            }
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                self.index(&target, &index)
            }
            Expr::Call(name, args) => {
                if !FUNCTIONS.contains(&name.as_str()) {
                    return Err(ExprError::unresolved(self.src, name));
                }
                let args = args.iter().map(|a| self.eval(a)).collect::<Result<Vec<_>>>()?;
                self.call(name, args)
            }
        }
    }

    fn binary(&self, op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
        match (op, left, right) {
            (BinaryOp::Add, Value::Str(a), Value::Str(b)) => return Ok(Value::Str(format!("{a}{b}"))),
            (BinaryOp::Add, Value::List(a), Value::List(b)) => {
                return Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
            }
            _ => {}
        }

        let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) else {
            return Err(self.fail(format!(
                "unsupported operand types for {op:?}: {} and {}",
                left.type_name(),
                right.type_name()
            )));
        };
        let overflow = || self.fail("integer overflow");

        match (op, a, b) {
            (BinaryOp::Add, Num::Int(x), Num::Int(y)) => x.checked_add(y).map(Value::Int).ok_or_else(overflow),
            (BinaryOp::Sub, Num::Int(x), Num::Int(y)) => x.checked_sub(y).map(Value::Int).ok_or_else(overflow),
            (BinaryOp::Mul, Num::Int(x), Num::Int(y)) => x.checked_mul(y).map(Value::Int).ok_or_else(overflow),
            (BinaryOp::Add, ..) => Ok(Value::Float(a.as_f64() + b.as_f64())),
            (BinaryOp::Sub, ..) => Ok(Value::Float(a.as_f64() - b.as_f64())),
            (BinaryOp::Mul, ..) => Ok(Value::Float(a.as_f64() * b.as_f64())),
            (BinaryOp::Div, ..) => {
                if b.as_f64() == 0.0 {
                    return Err(self.fail("division by zero"));
                }
                Ok(Value::Float(a.as_f64() / b.as_f64()))
            }
            (BinaryOp::FloorDiv, Num::Int(x), Num::Int(y)) => {
                if y == 0 {
                    return Err(self.fail("division by zero"));
                }
                let q = x.checked_div(y).ok_or_else(overflow)?;
                if x % y != 0 && ((x < 0) != (y < 0)) {
                    Ok(Value::Int(q - 1))
                } else {
                    Ok(Value::Int(q))
                }
            }
            (BinaryOp::FloorDiv, ..) => {
                if b.as_f64() == 0.0 {
                    return Err(self.fail("division by zero"));
                }
                Ok(Value::Float((a.as_f64() / b.as_f64()).floor()))
            }
            (BinaryOp::Mod, Num::Int(x), Num::Int(y)) => {
                if y == 0 {
                    return Err(self.fail("modulo by zero"));
                }
                let r = x.checked_rem(y).ok_or_else(overflow)?;
                // result takes the sign of the divisor
                if r != 0 && ((r < 0) != (y < 0)) {
                    Ok(Value::Int(r + y))
                } else {
                    Ok(Value::Int(r))
                }
            }
            (BinaryOp::Mod, ..) => {
                let (x, y) = (a.as_f64(), b.as_f64());
                if y == 0.0 {
                    return Err(self.fail("modulo by zero"));
                }
                Ok(Value::Float(x - y * (x / y).floor()))
            }
            (BinaryOp::Pow, Num::Int(x), Num::Int(y)) if y >= 0 => {
                let exp = u32::try_from(y).map_err(|_| overflow())?;
                x.checked_pow(exp).map(Value::Int).ok_or_else(overflow)
            }
            (BinaryOp::Pow, ..) => Ok(Value::Float(a.as_f64().powf(b.as_f64()))),
        }
    }

    fn order(&self, left: &Value, right: &Value) -> Result<Ordering> {
        match (left, right) {
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match self.order(x, y)? {
                        Ordering::Equal => continue,
                        other => return Ok(other),
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            _ => match (Num::of(left), Num::of(right)) {
                (Some(Num::Int(x)), Some(Num::Int(y))) => Ok(x.cmp(&y)),
                (Some(x), Some(y)) => x
                    .as_f64()
                    .partial_cmp(&y.as_f64())
                    .ok_or_else(|| self.fail("cannot order NaN")),
                _ => Err(self.fail(format!(
                    "cannot compare {} with {}",
                    left.type_name(),
                    right.type_name()
                ))),
            },
        }
    }

    fn equal(&self, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| self.equal(x, y))
            }
            _ => match (Num::of(left), Num::of(right)) {
                (Some(Num::Int(x)), Some(Num::Int(y))) => x == y,
                (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
                _ => false,
            },
        }
    }

    fn compare(&self, op: CompareOp, left: &Value, right: &Value) -> Result<bool> {
        Ok(match op {
            CompareOp::Eq => self.equal(left, right),
            CompareOp::Ne => !self.equal(left, right),
            CompareOp::Lt => self.order(left, right)? == Ordering::Less,
            CompareOp::Le => self.order(left, right)? != Ordering::Greater,
            CompareOp::Gt => self.order(left, right)? == Ordering::Greater,
            CompareOp::Ge => self.order(left, right)? != Ordering::Less,
        })
    }

    fn index(&self, target: &Value, index: &Value) -> Result<Value> {
        let Value::Int(i) = index else {
            return Err(self.fail(format!("indices must be integers, not {}", index.type_name())));
        };
        let position = |len: usize| -> Result<usize> {
            let len = len as i64;
            let at = if *i < 0 { len + i } else { *i };
            if at < 0 || at >= len {
                return Err(self.fail(format!("index {i} out of range")));
            }
            Ok(at as usize)
        };
        match target {
            Value::List(items) => Ok(items[position(items.len())?].clone()),
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                Ok(Value::Str(chars[position(chars.len())?].to_string()))
            }
            other => Err(self.fail(format!("{} is not subscriptable", other.type_name()))),
        }
    }

    fn call(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        match name {
            "abs" => {
                let [arg] = args.as_slice() else {
                    return Err(self.fail("abs() takes exactly one argument"));
                };
                match Num::of(arg) {
                    Some(Num::Int(i)) => i
                        .checked_abs()
                        .map(Value::Int)
                        .ok_or_else(|| self.fail("integer overflow")),
                    Some(Num::Float(f)) => Ok(Value::Float(f.abs())),
                    None => Err(self.fail(format!("bad operand type for abs(): {}", arg.type_name()))),
                }
            }
            "len" => {
                let [arg] = args.as_slice() else {
                    return Err(self.fail("len() takes exactly one argument"));
                };
                match arg {
                    Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                    Value::List(items) => Ok(Value::Int(items.len() as i64)),
                    other => Err(self.fail(format!("{} has no len()", other.type_name()))),
                }
            }
            _ => {
                let want = if name == "max" { Ordering::Greater } else { Ordering::Less };
                let candidates = match args.as_slice() {
                    [Value::List(items)] => items.clone(),
                    [_] => return Err(self.fail(format!("{name}() of a single value needs a list"))),
                    _ => args,
                };
                let mut best: Option<Value> = None;
                for candidate in candidates {
                    best = match best {
                        Some(current) if self.order(&candidate, &current)? != want => Some(current),
                        _ => Some(candidate),
                    };
                }
                best.ok_or_else(|| self.fail(format!("{name}() arg is an empty sequence")))
            }
        }
    }
}
