// tests/infer_tests.rs

use rhythmix::infer::{TypeInferError, ValueType, infer};
use rhythmix::lexer::tokenize;
use rhythmix::parser::Parser;
use rhythmix::runtime::Environment;
use rhythmix::value::Value;

fn infer_in(text: &str, env: &Environment) -> Result<ValueType, TypeInferError> {
    let expr = Parser::new(tokenize(text).unwrap()).parse().unwrap();
    infer(&expr, env)
}

fn infer_text(text: &str) -> Result<ValueType, TypeInferError> {
    infer_in(text, &Environment::new())
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_literal_types() {
    assert_eq!(infer_text("1"), Ok(ValueType::Integer));
    assert_eq!(infer_text("1.5"), Ok(ValueType::Float));
    assert_eq!(infer_text("true"), Ok(ValueType::Boolean));
}

#[test]
fn test_strings_and_durations_are_uninferable() {
    assert!(matches!(
        infer_text("'1'"),
        Err(TypeInferError::Uninferable { .. })
    ));
    assert!(matches!(
        infer_text("10ms"),
        Err(TypeInferError::Uninferable { .. })
    ));
}

// ============================================================================
// Arithmetic
// ============================================================================

#[test]
fn test_integer_arithmetic_stays_integer() {
    assert_eq!(infer_text("1+2*3"), Ok(ValueType::Integer));
    assert_eq!(infer_text("10-4"), Ok(ValueType::Integer));
}

#[test]
fn test_mixed_arithmetic_widens_to_float() {
    assert_eq!(infer_text("1+2.5"), Ok(ValueType::Float));
    assert_eq!(infer_text("0.5*4"), Ok(ValueType::Float));
}

#[test]
fn test_division_is_float() {
    assert_eq!(infer_text("4/2"), Ok(ValueType::Float));
}

#[test]
fn test_arithmetic_rejects_booleans() {
    let err = infer_text("1+true").unwrap_err();
    let TypeInferError::Mismatch { op, .. } = &err else {
        panic!("expected a mismatch, got {:?}", err);
    };
    assert_eq!(op, "+");
}

#[test]
fn test_increment_needs_integer() {
    assert_eq!(infer_text("++1"), Ok(ValueType::Integer));
    assert!(infer_text("++1.5").is_err());
}

// ============================================================================
// Bitwise and Logical
// ============================================================================

#[test]
fn test_bitwise_operators() {
    assert_eq!(infer_text("6&3"), Ok(ValueType::Integer));
    assert_eq!(infer_text("1<<4"), Ok(ValueType::Integer));
    assert!(infer_text("1.5|1").is_err());
}

#[test]
fn test_logical_operators() {
    assert_eq!(infer_text("true&&false"), Ok(ValueType::Boolean));
    assert!(infer_text("1||true").is_err());
}

#[test]
fn test_unary_operators_need_integers() {
    assert_eq!(infer_text("!1"), Ok(ValueType::Integer));
    assert_eq!(infer_text("--4"), Ok(ValueType::Integer));
    assert!(infer_text("!true").is_err());
    assert!(infer_text("!2.5").is_err());
}

#[test]
fn test_comparisons_are_boolean() {
    assert_eq!(infer_text("1==1.0"), Ok(ValueType::Boolean));
    assert_eq!(infer_text("true!=false"), Ok(ValueType::Boolean));
    assert_eq!(infer_text("2>1.5"), Ok(ValueType::Boolean));
    assert!(infer_text("true>1").is_err());
}

// ============================================================================
// Variables
// ============================================================================

#[test]
fn test_numeric_constants() {
    let mut env = Environment::new();
    env.define("MAX", Value::Integer(100));
    env.define("RATE", Value::Float(0.25));
    env.define("LIMIT", Value::from("42"));
    assert_eq!(infer_in("MAX", &env), Ok(ValueType::Integer));
    assert_eq!(infer_in("RATE", &env), Ok(ValueType::Float));
    assert_eq!(infer_in("LIMIT*2", &env), Ok(ValueType::Integer));
    assert_eq!(infer_in("MAX+RATE", &env), Ok(ValueType::Float));
}

#[test]
fn test_whole_float_constant_is_float() {
    let mut env = Environment::new();
    env.define("K", Value::Float(10.0));
    assert_eq!(infer_in("K", &env), Ok(ValueType::Float));
}

#[test]
fn test_undefined_variable() {
    let err = infer_text("MISSING+1").unwrap_err();
    let TypeInferError::UndefinedVariable { name, position } = err else {
        panic!("expected an undefined variable");
    };
    assert_eq!(name, "MISSING");
    assert_eq!(position.column, 1);
}

#[test]
fn test_non_numeric_constant() {
    let mut env = Environment::new();
    env.define("MODE", Value::from("auto"));
    env.define("ON", Value::Boolean(true));
    assert!(matches!(
        infer_in("MODE", &env),
        Err(TypeInferError::NonNumericVariable { .. })
    ));
    assert!(matches!(
        infer_in("ON", &env),
        Err(TypeInferError::NonNumericVariable { .. })
    ));
}

// ============================================================================
// Non-operand Expressions
// ============================================================================

#[test]
fn test_rule_expressions_are_uninferable() {
    for text in [">1", "(1,5]", "{==0}->{==1}", "count(>1,3)", "sum().meet(>1)"] {
        assert!(
            matches!(infer_text(text), Err(TypeInferError::Uninferable { .. })),
            "Failed for input: {}",
            text
        );
    }
}

#[test]
fn test_error_messages_name_the_problem() {
    let err = infer_text("1+true").unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("Type inference error"));
    assert!(message.contains("INTEGER"), "{}", message);
}
