//! JSON <-> rhythmix Value/Event conversion utilities

use super::CliError;
use crate::{Event, Value};

/// Convert a JSON scalar to a Value. Arrays and objects are not readings.
pub fn json_to_value(v: serde_json::Value) -> Result<Value, CliError> {
    match v {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Boolean(b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Integer(i))
            } else {
                n.as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| CliError::InvalidEvent(format!("number {} is out of range", n)))
            }
        }
        serde_json::Value::String(s) => Ok(Value::String(s)),
        other => Err(CliError::InvalidEvent(format!(
            "expected a scalar value, got {}",
            other
        ))),
    }
}

/// Convert a Value to serde_json::Value
pub fn value_to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
    }
}

/// Convert one JSON event.
///
/// Objects carry `value` and optionally `id` and `timestamp` (milliseconds);
/// a bare scalar is a reading on its own. A missing timestamp defaults to
/// the event's position in the input.
pub fn json_to_event(v: serde_json::Value, index: usize) -> Result<Event, CliError> {
    let serde_json::Value::Object(mut obj) = v else {
        return Ok(Event::new(index.to_string(), json_to_value(v)?, index as i64));
    };

    let value = obj
        .remove("value")
        .ok_or_else(|| CliError::InvalidEvent(format!("event #{} has no 'value'", index)))?;

    let id = match obj.remove("id") {
        None | Some(serde_json::Value::Null) => index.to_string(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    };

    let timestamp = match obj.remove("timestamp") {
        None | Some(serde_json::Value::Null) => index as i64,
        Some(serde_json::Value::Number(n)) => n.as_i64().ok_or_else(|| {
            CliError::InvalidEvent(format!("event #{} has a non-integer timestamp", index))
        })?,
        Some(other) => {
            return Err(CliError::InvalidEvent(format!(
                "event #{} has timestamp {}, expected milliseconds",
                index, other
            )));
        }
    };

    Ok(Event::new(id, json_to_value(value)?, timestamp))
}

pub fn event_to_json(event: &Event) -> serde_json::Value {
    serde_json::json!({
        "id": event.id,
        "value": value_to_json(&event.value),
        "timestamp": event.timestamp,
    })
}

/// Parses events given as a JSON array, a single JSON value or one JSON
/// value per line.
pub fn parse_events(text: &str) -> Result<Vec<Event>, CliError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CliError::NoInput);
    }

    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return match parsed {
            serde_json::Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| json_to_event(item, i))
                .collect(),
            single => Ok(vec![json_to_event(single, 0)?]),
        };
    }

    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| json_to_event(serde_json::from_str(line)?, i))
        .collect()
}

/// Parses a `NAME=VALUE` definition. VALUE is read as a JSON scalar when it
/// is one and as plain text otherwise.
pub fn parse_define(arg: &str) -> Result<(String, Value), CliError> {
    let Some((name, raw)) = arg.split_once('=') else {
        return Err(CliError::InvalidDefine(arg.to_string()));
    };
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(CliError::InvalidDefine(arg.to_string()));
    }

    let value = serde_json::from_str::<serde_json::Value>(raw.trim())
        .ok()
        .and_then(|v| json_to_value(v).ok())
        .unwrap_or_else(|| Value::String(raw.to_string()));
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_scalars_are_events() {
        let events = parse_events("[0, 1.5, \"on\"]").unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].value, Value::Float(1.5));
        assert_eq!(events[2].timestamp, 2);
    }

    #[test]
    fn test_newline_delimited_objects() {
        let text = "{\"id\":\"a\",\"value\":3,\"timestamp\":100}\n{\"value\":4,\"timestamp\":200}\n";
        let events = parse_events(text).unwrap();
        assert_eq!(events[0].id, "a");
        assert_eq!(events[1].timestamp, 200);
    }

    #[test]
    fn test_define_values() {
        assert_eq!(parse_define("MAX=100").unwrap(), ("MAX".to_string(), Value::Integer(100)));
        assert_eq!(
            parse_define("MODE=auto").unwrap(),
            ("MODE".to_string(), Value::from("auto"))
        );
        assert!(parse_define("novalue").is_err());
    }
}
