//! Static type inference for operand expressions.
//!
//! Only arithmetic, bitwise and logical trees over scalars and numeric
//! constants are inferable. Range bounds are the main client: both bounds
//! must infer to the same numeric type before a range is translated.

use std::fmt;

use regex::Regex;

use crate::{
    ast::{BinOp, CompareOp, Expr, Literal, Position, UnaryOp},
    runtime::Environment,
    value::Value,
};

/// Textual shape a constant must have to be used in an inferable operand.
const NUMBER_PATTERN: &str = r"^-?[0-9]+(\.[0-9]+)?$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Integer,
    Float,
    Boolean,
}

impl ValueType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Float)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Integer => write!(f, "INTEGER"),
            ValueType::Float => write!(f, "FLOAT"),
            ValueType::Boolean => write!(f, "BOOLEAN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeInferError {
    /// Operand types the operator does not accept
    Mismatch {
        op: String,
        message: String,
        position: Position,
    },

    /// Variable not bound in the environment
    UndefinedVariable { name: String, position: Position },

    /// Variable bound to something that does not read as a number
    NonNumericVariable {
        name: String,
        value: String,
        position: Position,
    },

    /// Expression kind whose type cannot be known before running
    Uninferable { what: String, position: Position },
}

impl TypeInferError {
    pub fn position(&self) -> Position {
        match self {
            TypeInferError::Mismatch { position, .. }
            | TypeInferError::UndefinedVariable { position, .. }
            | TypeInferError::NonNumericVariable { position, .. }
            | TypeInferError::Uninferable { position, .. } => *position,
        }
    }
}

impl fmt::Display for TypeInferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeInferError::Mismatch { op, message, .. } => {
                write!(f, "Type inference error: '{}' {}", op, message)
            }
            TypeInferError::UndefinedVariable { name, .. } => {
                write!(f, "Type inference error: undefined variable '{}'", name)
            }
            TypeInferError::NonNumericVariable { name, value, .. } => write!(
                f,
                "Type inference error: variable '{}' is bound to {}, only numeric constants are supported",
                name, value
            ),
            TypeInferError::Uninferable { what, .. } => {
                write!(f, "Type inference error: cannot infer the type of {}", what)
            }
        }
    }
}

impl std::error::Error for TypeInferError {}

/// Infers the type `expr` evaluates to, resolving variables against the
/// constants bound in `env`.
pub fn infer(expr: &Expr, env: &Environment) -> Result<ValueType, TypeInferError> {
    match expr {
        Expr::Scalar(scalar) => match &scalar.value {
            Literal::Integer(_) => Ok(ValueType::Integer),
            Literal::Float(_) => Ok(ValueType::Float),
            Literal::Boolean(_) => Ok(ValueType::Boolean),
            Literal::Str(_) => Err(uninferable("a string literal", expr)),
            Literal::Duration(_) => Err(uninferable("a duration literal", expr)),
        },

        Expr::Variable(ident) => {
            let position = ident.token.position;
            let value = env
                .constant(&ident.name)
                .ok_or_else(|| TypeInferError::UndefinedVariable {
                    name: ident.name.clone(),
                    position,
                })?;
            let text = numeric_text(value);

            let number = Regex::new(NUMBER_PATTERN).map_err(|e| TypeInferError::Uninferable {
                what: format!("variable '{}' ({e})", ident.name),
                position,
            })?;
            if !number.is_match(&text) {
                return Err(TypeInferError::NonNumericVariable {
                    name: ident.name.clone(),
                    value: value.to_string(),
                    position,
                });
            }
            if text.contains('.') {
                Ok(ValueType::Float)
            } else {
                Ok(ValueType::Integer)
            }
        }

        Expr::Binary { op, left, right } => {
            let lt = infer(left, env)?;
            let rt = infer(right, env)?;
            infer_binary(*op, lt, rt, expr.position())
        }

        Expr::Unary { op, operand } => {
            let t = infer(operand, env)?;
            match t {
                ValueType::Integer => Ok(ValueType::Integer),
                _ => Err(mismatch(*op, "only applies to integers", expr)),
            }
        }

        Expr::Call(call) => Err(TypeInferError::Uninferable {
            what: format!("the result of '{}()'", call.name),
            position: call.position(),
        }),
        Expr::Chain(_) => Err(uninferable("a chain expression", expr)),
        Expr::Arrow(_) => Err(uninferable("an arrow expression", expr)),
        Expr::Compare { .. } => Err(uninferable("a compare expression", expr)),
        Expr::Range { .. } => Err(uninferable("a range expression", expr)),
        Expr::Lambda { .. } => Err(uninferable("an anonymous function", expr)),
    }
}

fn infer_binary(
    op: BinOp,
    lt: ValueType,
    rt: ValueType,
    position: Position,
) -> Result<ValueType, TypeInferError> {
    let fail = |message: &str| TypeInferError::Mismatch {
        op: op.symbol().to_string(),
        message: format!("{} (got {} and {})", message, lt, rt),
        position,
    };

    if op == BinOp::Divide {
        return if lt.is_numeric() || rt.is_numeric() {
            Ok(ValueType::Float)
        } else {
            Err(fail("needs numeric operands"))
        };
    }

    if op.is_arithmetic() {
        return match (lt, rt) {
            (ValueType::Integer, ValueType::Integer) => Ok(ValueType::Integer),
            (ValueType::Float, ValueType::Integer | ValueType::Float)
            | (ValueType::Integer, ValueType::Float) => Ok(ValueType::Float),
            _ => Err(fail("only accepts integers or floats on both sides")),
        };
    }

    if op.is_bitwise() {
        return match (lt, rt) {
            (ValueType::Integer, ValueType::Integer) => Ok(ValueType::Integer),
            (ValueType::Float, _) | (_, ValueType::Float) => {
                Err(fail("does not support floats"))
            }
            _ => Err(fail("only accepts integers")),
        };
    }

    if op.is_logical() {
        return match (lt, rt) {
            (ValueType::Boolean, ValueType::Boolean) => Ok(ValueType::Boolean),
            _ => Err(fail("only accepts booleans")),
        };
    }

    // Comparisons between two operands
    let equality = op.as_compare().is_some_and(CompareOp::is_equality);
    if equality || (lt.is_numeric() && rt.is_numeric()) {
        Ok(ValueType::Boolean)
    } else {
        Err(fail("orders numbers only"))
    }
}

/// Text of a constant as the numeric-literal check sees it. Floats keep
/// their fractional part so `10.0` still infers as a float.
fn numeric_text(value: &Value) -> String {
    match value {
        Value::Float(n) => format!("{:?}", n),
        other => other.as_string(),
    }
}

fn uninferable(what: &str, expr: &Expr) -> TypeInferError {
    TypeInferError::Uninferable {
        what: what.to_string(),
        position: expr.position(),
    }
}

fn mismatch(op: UnaryOp, message: &str, expr: &Expr) -> TypeInferError {
    TypeInferError::Mismatch {
        op: op.symbol().to_string(),
        message: message.to_string(),
        position: expr.position(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer::tokenize, parser::Parser};

    fn infer_text(text: &str, env: &Environment) -> Result<ValueType, TypeInferError> {
        let expr = Parser::new(tokenize(text).unwrap()).parse().unwrap();
        infer(&expr, env)
    }

    #[test]
    fn test_float_constant_keeps_fraction() {
        let mut env = Environment::new();
        env.define("K", Value::Float(10.0));
        assert_eq!(infer_text("K", &env), Ok(ValueType::Float));
    }

    #[test]
    fn test_numeric_string_constant() {
        let mut env = Environment::new();
        env.define("MAX", Value::from("100"));
        env.define("NAME", Value::from("pump"));
        assert_eq!(infer_text("MAX+1", &env), Ok(ValueType::Integer));
        assert!(matches!(
            infer_text("NAME", &env),
            Err(TypeInferError::NonNumericVariable { .. })
        ));
    }
}
