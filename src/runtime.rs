//! Runtime interpretation of translated rules.
//!
//! [`eval`] walks a [`Code`] tree against one event. Stateful fragments
//! keep their state in the [`Environment`] under the fragment name, so a
//! compiled matcher carries all of its cross-call memory in one place.

use std::{cmp::Ordering, collections::HashMap, fmt};

use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};

use crate::{
    ast::{BinOp, CompareOp},
    translator::{Code, Fragment, FragmentBody},
    udf::{UdfError, UdfRegistry},
    value::{Event, Value, loose_cmp, loose_eq, to_decimal},
};

mod aggregate;
mod arrow;
mod chain;
mod function;

pub use arrow::ArrowState;
pub use chain::ChainState;
pub use function::FunctionState;

/// Errors raised while executing a compiled rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// Structurally invalid operator argument (`take(5,3)`)
    InvalidArgument { fragment: String, message: String },

    /// Operation not defined for the operand types
    TypeError(String),

    DivisionByZero,

    /// A call refers to a fragment the rule does not have
    MissingFragment(String),

    /// UDF lookup failed
    Udf(UdfError),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::InvalidArgument { fragment, message } => {
                write!(f, "Invalid argument in {}: {}", fragment, message)
            }
            RuntimeError::TypeError(msg) => write!(f, "Type error: {}", msg),
            RuntimeError::DivisionByZero => write!(f, "Division by zero"),
            RuntimeError::MissingFragment(name) => write!(f, "Unknown fragment '{}'", name),
            RuntimeError::Udf(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Udf(e) => Some(e),
            _ => None,
        }
    }
}

impl From<UdfError> for RuntimeError {
    fn from(e: UdfError) -> Self {
        RuntimeError::Udf(e)
    }
}

/// Per-fragment mutable state.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentState {
    Chain(ChainState),
    Arrow(ArrowState),
    Function(FunctionState),
}

impl FragmentState {
    /// State of a fragment that has not seen any event.
    pub fn initial(body: &FragmentBody) -> Self {
        match body {
            FragmentBody::Chain(_) => FragmentState::Chain(ChainState::default()),
            FragmentBody::Arrow(_) => FragmentState::Arrow(ArrowState::default()),
            FragmentBody::Function(plan) => FragmentState::Function(FunctionState::initial(plan)),
        }
    }
}

/// Constants bound before or during compilation, plus the state of every
/// stateful fragment of one compiled matcher.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    constants: HashMap<String, Value>,
    states: HashMap<String, FragmentState>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    pub fn define(&mut self, name: &str, value: Value) {
        self.constants.insert(name.to_string(), value);
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    pub fn constants(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.constants.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn state(&self, fragment: &str) -> Option<&FragmentState> {
        self.states.get(fragment)
    }

    /// Forgets the state of one fragment; it restarts from scratch.
    pub fn reset_state(&mut self, fragment: &str) {
        self.states.remove(fragment);
    }

    /// Forgets all fragment state. Constants are kept.
    pub fn clear_states(&mut self) {
        self.states.clear();
    }
}

/// What one evaluation can see besides the environment.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub event: &'a Event,
    /// Timestamp at which the enclosing arrow's previous stage succeeded
    pub anchor: Option<i64>,
    pub fragments: &'a [Fragment],
    pub udfs: &'a UdfRegistry,
}

impl<'a> Frame<'a> {
    pub fn new(event: &'a Event, fragments: &'a [Fragment], udfs: &'a UdfRegistry) -> Self {
        Frame {
            event,
            anchor: None,
            fragments,
            udfs,
        }
    }

    pub fn with_anchor(&self, anchor: Option<i64>) -> Self {
        Frame { anchor, ..*self }
    }
}

/// Evaluates `code` with `subject` as the value under test.
pub fn eval(
    code: &Code,
    subject: &Value,
    frame: &Frame<'_>,
    env: &mut Environment,
) -> Result<Value, RuntimeError> {
    match code {
        Code::Literal(v) => Ok(v.clone()),

        Code::Subject => Ok(subject.clone()),

        Code::Binary { op, left, right } => match op {
            BinOp::And => {
                if !eval(left, subject, frame, env)?.as_bool() {
                    return Ok(Value::Boolean(false));
                }
                Ok(Value::Boolean(eval(right, subject, frame, env)?.as_bool()))
            }
            BinOp::Or => {
                if eval(left, subject, frame, env)?.as_bool() {
                    return Ok(Value::Boolean(true));
                }
                Ok(Value::Boolean(eval(right, subject, frame, env)?.as_bool()))
            }
            _ => {
                let l = eval(left, subject, frame, env)?;
                let r = eval(right, subject, frame, env)?;
                binary(*op, &l, &r)
            }
        },

        Code::Not(inner) => Ok(Value::Boolean(!eval(inner, subject, frame, env)?.as_bool())),

        Code::Step { operand, delta } => {
            let v = eval(operand, subject, frame, env)?;
            arithmetic(BinOp::Add, &v, &Value::Integer(*delta))
        }

        Code::Compare { op, operand } => {
            let rhs = eval(operand, subject, frame, env)?;
            Ok(Value::Boolean(compare(*op, subject, &rhs)))
        }

        Code::Call { name, index } => {
            call_fragment(name, *index, frame, env).map(Value::Boolean)
        }

        Code::FilterUdf(name) => {
            let udf = frame.udfs.filter(name)?;
            let event = Event {
                value: subject.clone(),
                ..frame.event.clone()
            };
            Ok(Value::Boolean(udf.filter(&event)))
        }
    }
}

/// Runs one fragment, threading its state out of and back into `env`.
fn call_fragment(
    name: &str,
    index: usize,
    frame: &Frame<'_>,
    env: &mut Environment,
) -> Result<bool, RuntimeError> {
    let fragment = frame
        .fragments
        .get(index)
        .filter(|f| f.name == name)
        .ok_or_else(|| RuntimeError::MissingFragment(name.to_string()))?;

    let mut state = env
        .states
        .remove(name)
        .unwrap_or_else(|| FragmentState::initial(&fragment.body));

    let result = match (&fragment.body, &mut state) {
        (FragmentBody::Chain(plan), FragmentState::Chain(s)) => {
            chain::run(name, plan, s, frame, env)
        }
        (FragmentBody::Arrow(plan), FragmentState::Arrow(s)) => arrow::run(plan, s, frame, env),
        (FragmentBody::Function(plan), FragmentState::Function(s)) => {
            function::run(plan, s, frame, env)
        }
        _ => Err(RuntimeError::MissingFragment(name.to_string())),
    };

    env.states.insert(name.to_string(), state);
    result
}

/// Constant value of `code` when it does not depend on the event.
pub fn fold(code: &Code) -> Option<Value> {
    match code {
        Code::Literal(v) => Some(v.clone()),
        Code::Binary { op, left, right } => binary(*op, &fold(left)?, &fold(right)?).ok(),
        Code::Not(inner) => Some(Value::Boolean(!fold(inner)?.as_bool())),
        Code::Step { operand, delta } => {
            arithmetic(BinOp::Add, &fold(operand)?, &Value::Integer(*delta)).ok()
        }
        Code::Subject | Code::Compare { .. } | Code::Call { .. } | Code::FilterUdf(_) => None,
    }
}

/// Compares the value under test against `rhs`. Orderings involving a
/// non-number are false.
pub fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> bool {
    match op {
        CompareOp::Equal => loose_eq(lhs, rhs),
        CompareOp::NotEqual => !loose_eq(lhs, rhs),
        CompareOp::GreaterThan => loose_cmp(lhs, rhs) == Some(Ordering::Greater),
        CompareOp::LessThan => loose_cmp(lhs, rhs) == Some(Ordering::Less),
        CompareOp::GreaterEqual => {
            matches!(loose_cmp(lhs, rhs), Some(Ordering::Greater | Ordering::Equal))
        }
        CompareOp::LessEqual => {
            matches!(loose_cmp(lhs, rhs), Some(Ordering::Less | Ordering::Equal))
        }
    }
}

fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    if let Some(cmp) = op.as_compare() {
        return Ok(Value::Boolean(compare(cmp, left, right)));
    }
    match op {
        BinOp::And => Ok(Value::Boolean(left.as_bool() && right.as_bool())),
        BinOp::Or => Ok(Value::Boolean(left.as_bool() || right.as_bool())),
        op if op.is_bitwise() => bitwise(op, left, right),
        op => arithmetic(op, left, right),
    }
}

fn bitwise(op: BinOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let (Value::Integer(a), Value::Integer(b)) = (left, right) else {
        return Err(RuntimeError::TypeError(format!(
            "'{}' needs integers, got {} and {}",
            op,
            left.type_name(),
            right.type_name()
        )));
    };
    let shift = |n: i64| u32::try_from(n).ok();
    let result = match op {
        BinOp::BitOr => Some(a | b),
        BinOp::BitXor => Some(a ^ b),
        BinOp::BitAnd => Some(a & b),
        BinOp::ShiftLeft => shift(*b).and_then(|s| a.checked_shl(s)),
        BinOp::ShiftRight => shift(*b).and_then(|s| a.checked_shr(s)),
        _ => None,
    };
    result
        .map(Value::Integer)
        .ok_or_else(|| RuntimeError::TypeError(format!("'{}' out of range: {} {} {}", op, a, op, b)))
}

/// `+ - * /` with integer results kept as integers and mixed operands
/// computed in decimal.
pub fn arithmetic(op: BinOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    if let (Value::Integer(a), Value::Integer(b)) = (left, right) {
        let exact = match op {
            BinOp::Add => a.checked_add(*b),
            BinOp::Subtract => a.checked_sub(*b),
            BinOp::Multiply => a.checked_mul(*b),
            BinOp::Divide => {
                if *b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                match a.checked_rem(*b) {
                    Some(0) => a.checked_div(*b),
                    Some(_) => return Ok(Value::Float(*a as f64 / *b as f64)),
                    // i64::MIN / -1 overflows; the decimal path below handles it
                    None => None,
                }
            }
            _ => None,
        };
        if let Some(n) = exact {
            return Ok(Value::Integer(n));
        }
    }

    let (Some(ad), Some(bd)) = (to_decimal(left), to_decimal(right)) else {
        return Err(RuntimeError::TypeError(format!(
            "Cannot apply '{}' to {} and {}",
            op,
            left.type_name(),
            right.type_name()
        )));
    };

    let exact = match op {
        BinOp::Add => ad.checked_add(bd),
        BinOp::Subtract => ad.checked_sub(bd),
        BinOp::Multiply => ad.checked_mul(bd),
        BinOp::Divide => {
            if bd.is_zero() {
                return Err(RuntimeError::DivisionByZero);
            }
            ad.checked_div(bd)
        }
        _ => {
            return Err(RuntimeError::TypeError(format!(
                "'{}' is not an arithmetic operator",
                op
            )));
        }
    };

    match exact {
        Some(d) => Ok(Value::from_decimal(d)),
        None => float_fallback(op, &ad, &bd),
    }
}

fn float_fallback(op: BinOp, a: &Decimal, b: &Decimal) -> Result<Value, RuntimeError> {
    let (Some(a), Some(b)) = (a.to_f64(), b.to_f64()) else {
        return Err(RuntimeError::TypeError("numeric overflow".to_string()));
    };
    let r = match op {
        BinOp::Add => a + b,
        BinOp::Subtract => a - b,
        BinOp::Multiply => a * b,
        _ => a / b,
    };
    Ok(Decimal::from_f64(r)
        .map(Value::from_decimal)
        .unwrap_or(Value::Float(r)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_constant_arithmetic() {
        let code = Code::binary(
            BinOp::Add,
            Code::Literal(Value::Integer(1)),
            Code::binary(
                BinOp::Multiply,
                Code::Literal(Value::Integer(2)),
                Code::Literal(Value::Float(1.5)),
            ),
        );
        assert_eq!(fold(&code), Some(Value::Integer(4)));
        assert_eq!(fold(&Code::Subject), None);
    }

    #[test]
    fn test_division_keeps_fraction() {
        assert_eq!(
            arithmetic(BinOp::Divide, &Value::Integer(1), &Value::Integer(4)),
            Ok(Value::Float(0.25))
        );
        assert_eq!(
            arithmetic(BinOp::Divide, &Value::Integer(1), &Value::Integer(0)),
            Err(RuntimeError::DivisionByZero)
        );
    }

    #[test]
    fn test_compare_is_loose() {
        assert!(compare(CompareOp::GreaterEqual, &Value::from("10"), &Value::Integer(10)));
        assert!(!compare(CompareOp::GreaterThan, &Value::from("hot"), &Value::Integer(1)));
        assert!(compare(CompareOp::NotEqual, &Value::from("hot"), &Value::from("cold")));
    }
}
