use std::fmt;

use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};

/// A scalar value flowing through a rule: an event reading, a constant or
/// an intermediate result.
///
/// Integers and floats are kept apart so that `sum()` over integer readings
/// stays an integer.
///
/// # Examples
///
/// ```
/// use rhythmix::Value;
///
/// let reading = Value::Float(3.5);
/// let label = Value::from("on");
///
/// assert_eq!(reading.to_number(), Some(3.5));
/// assert_eq!(Value::from("12").to_number(), Some(12.0));
/// assert_eq!(label.to_number(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,

    Boolean(bool),

    Integer(i64),

    Float(f64),

    /// Text reading; numeric text still compares numerically
    String(String),
}

impl Value {
    /// Check if the value is truthy (for conditions)
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
        }
    }

    /// Convert to boolean for conditions
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            _ => self.is_truthy(),
        }
    }

    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Float(n) if n.fract() == 0.0 => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Float(n) => n.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Null => "null".to_string(),
        }
    }

    /// Numeric reading of this value. Numeric strings parse; anything else
    /// is not a number.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            Value::Boolean(_) | Value::Null => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
        }
    }

    /// Float result that collapses to an integer when it is whole.
    pub fn from_decimal(d: Decimal) -> Value {
        if d.is_integer()
            && let Some(n) = d.to_i64()
        {
            return Value::Integer(n);
        }
        d.to_f64().map(Value::Float).unwrap_or(Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "'{}'", s),
            Value::Float(n) => write!(f, "{:?}", n),
            other => write!(f, "{}", other.as_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Decimal view of a numeric value, used where float error would leak into
/// results (`0.1 + 0.2` must compare equal to `0.3`).
pub fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Integer(n) => Decimal::from_i64(*n),
        Value::Float(n) => Decimal::from_f64(*n),
        Value::String(_) => value.to_number().and_then(Decimal::from_f64),
        _ => None,
    }
}

/// Equality under the rule language's loose typing: numeric when both sides
/// read as numbers, textual otherwise.
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Null, Value::Null) => true,
        _ => match (left.to_number(), right.to_number()) {
            (Some(a), Some(b)) => match (to_decimal(left), to_decimal(right)) {
                (Some(da), Some(db)) => da == db,
                _ => a == b,
            },
            _ => left.as_string() == right.as_string(),
        },
    }
}

/// Ordering used by `>`, `<`, `>=`, `<=`. `None` when either side is not a
/// number, which makes every ordering test false.
pub fn loose_cmp(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(da), Some(db)) = (to_decimal(left), to_decimal(right)) {
        return Some(da.cmp(&db));
    }
    left.to_number()?.partial_cmp(&right.to_number()?)
}

/// One reading fed to a compiled matcher.
///
/// `timestamp` is in milliseconds; time-based operators compare these and
/// never consult the wall clock.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: String,
    pub value: Value,
    pub timestamp: i64,
}

impl Event {
    pub fn new(id: impl Into<String>, value: impl Into<Value>, timestamp: i64) -> Self {
        Event {
            id: id.into(),
            value: value.into(),
            timestamp,
        }
    }

    /// Event with an empty id, convenient for tests and hosts that do not
    /// track ids.
    pub fn at(value: impl Into<Value>, timestamp: i64) -> Self {
        Event::new("", value, timestamp)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.value, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_numeric_strings_compare_as_numbers() {
        assert!(loose_eq(&Value::from("5"), &Value::Integer(5)));
        assert_eq!(
            loose_cmp(&Value::from("10"), &Value::Float(9.5)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_text_ordering_is_undefined() {
        assert!(loose_eq(&Value::from("on"), &Value::from("on")));
        assert_eq!(loose_cmp(&Value::from("on"), &Value::Integer(1)), None);
    }

    #[test]
    fn test_decimal_equality() {
        let sum = Value::from_decimal(
            to_decimal(&Value::Float(0.1)).unwrap() + to_decimal(&Value::Float(0.2)).unwrap(),
        );
        assert!(loose_eq(&sum, &Value::Float(0.3)));
        assert_eq!(Value::from_decimal(Decimal::from(4)), Value::Integer(4));
    }
}
