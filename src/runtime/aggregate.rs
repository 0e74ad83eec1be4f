use rust_decimal::{Decimal, prelude::ToPrimitive};

use crate::{
    translator::Calculator,
    value::{Event, Value, loose_cmp, to_decimal},
};

use super::{Environment, Frame, RuntimeError, eval};

/// Reduces `batch` to the value `meet` tests. Empty input reduces to 0 and
/// non-numeric readings are skipped by the numeric reductions.
pub(super) fn calculate(
    calc: &Calculator,
    batch: &[Event],
    frame: &Frame<'_>,
    env: &mut Environment,
) -> Result<Value, RuntimeError> {
    let numbers: Vec<&Value> = batch
        .iter()
        .map(|e| &e.value)
        .filter(|v| v.to_number().is_some())
        .collect();

    let result = match calc {
        Calculator::Sum => sum(&numbers),
        Calculator::Avg => average(&numbers),
        Calculator::Min => extreme(&numbers, std::cmp::Ordering::Less),
        Calculator::Max => extreme(&numbers, std::cmp::Ordering::Greater),
        Calculator::Stddev => stddev(&numbers),
        Calculator::Count => Value::Integer(batch.len() as i64),
        Calculator::HitRate(cond) => {
            if batch.is_empty() {
                return Ok(Value::Integer(0));
            }
            let mut hits = 0usize;
            for event in batch {
                if eval(cond, &event.value, frame, env)?.as_bool() {
                    hits += 1;
                }
            }
            Value::Float(hits as f64 / batch.len() as f64)
        }
        Calculator::Udf(name) => Value::Float(frame.udfs.calculator(name)?.calculate(batch)),
    };
    Ok(result)
}

/// Integer when every value is an integer, otherwise a float summed in
/// decimal so `5.5 + 8 + 2.8` is exactly `16.3`.
fn sum(values: &[&Value]) -> Value {
    if values.iter().all(|v| matches!(v, Value::Integer(_))) {
        let total = values
            .iter()
            .filter_map(|v| v.as_int())
            .try_fold(0i64, |acc, n| acc.checked_add(n));
        if let Some(total) = total {
            return Value::Integer(total);
        }
    }
    match decimal_sum(values) {
        Some(total) => Value::Float(total.to_f64().unwrap_or(0.0)),
        None => Value::Float(values.iter().filter_map(|v| v.to_number()).sum()),
    }
}

fn decimal_sum(values: &[&Value]) -> Option<Decimal> {
    values
        .iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(to_decimal(v)?))
}

fn average(values: &[&Value]) -> Value {
    if values.is_empty() {
        return Value::Integer(0);
    }
    let count = values.len() as f64;
    let mean = decimal_sum(values)
        .and_then(|total| total.checked_div(Decimal::from(values.len())))
        .and_then(|d| d.to_f64())
        .unwrap_or_else(|| values.iter().filter_map(|v| v.to_number()).sum::<f64>() / count);
    Value::Float(mean)
}

fn extreme(values: &[&Value], keep: std::cmp::Ordering) -> Value {
    values
        .iter()
        .copied()
        .reduce(|best, v| {
            if loose_cmp(v, best) == Some(keep) {
                v
            } else {
                best
            }
        })
        .cloned()
        .unwrap_or(Value::Integer(0))
}

/// Population standard deviation.
fn stddev(values: &[&Value]) -> Value {
    if values.len() < 2 {
        return Value::Float(0.0);
    }
    let numbers: Vec<f64> = values.iter().filter_map(|v| v.to_number()).collect();
    let n = numbers.len() as f64;
    let mean = numbers.iter().sum::<f64>() / n;
    let variance = numbers.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    Value::Float(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_stays_integer() {
        let (a, b) = (Value::Integer(2), Value::Integer(3));
        assert_eq!(sum(&[&a, &b]), Value::Integer(5));
    }

    #[test]
    fn test_sum_of_floats_is_exact() {
        let values = [Value::Float(5.5), Value::Integer(8), Value::Float(2.8)];
        let refs: Vec<&Value> = values.iter().collect();
        assert_eq!(sum(&refs), Value::Float(16.3));
    }

    #[test]
    fn test_population_stddev() {
        let values = [Value::Integer(1), Value::Integer(2), Value::Integer(3), Value::Integer(4)];
        let refs: Vec<&Value> = values.iter().collect();
        let Value::Float(sd) = stddev(&refs) else {
            panic!("stddev is a float");
        };
        assert!((sd - 1.118_033_988).abs() < 1e-6);
        assert_eq!(stddev(&refs[..1]), Value::Float(0.0));
    }

    #[test]
    fn test_empty_reductions_are_zero() {
        assert_eq!(average(&[]), Value::Integer(0));
        assert_eq!(extreme(&[], std::cmp::Ordering::Less), Value::Integer(0));
        assert_eq!(sum(&[]), Value::Integer(0));
    }
}
