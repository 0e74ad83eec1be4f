// tests/cli_tests.rs

use rhythmix::Value;
use rhythmix::cli::{
    CheckOptions, CheckResult, CliError, execute_check, parse_define, parse_events,
};

fn options(rule: &str) -> CheckOptions {
    CheckOptions {
        rule: rule.to_string(),
        ..Default::default()
    }
}

fn matched(result: CheckResult) -> Vec<bool> {
    let CheckResult::Matched(serde_json::Value::Array(rows)) = result else {
        panic!("expected match results");
    };
    rows.iter()
        .map(|row| row["matched"].as_bool().unwrap())
        .collect()
}

// ============================================================================
// Replaying Events
// ============================================================================

#[test]
fn test_replay_array_of_objects() {
    let mut opts = options("{==0}->{==1}");
    opts.events = Some(
        r#"[{"id":"a","value":0,"timestamp":10},{"id":"b","value":1,"timestamp":20}]"#
            .to_string(),
    );
    let result = execute_check(&opts).unwrap();
    let CheckResult::Matched(rows) = &result else {
        panic!("expected match results");
    };
    assert_eq!(rows[1]["id"], "b");
    assert_eq!(rows[1]["timestamp"], 20);
    assert_eq!(matched(result), vec![false, true]);
}

#[test]
fn test_replay_ndjson() {
    let mut opts = options("filter(>0).sum().meet(>10)");
    opts.events = Some("5.5\n-3\n8\n2.8\n".to_string());
    assert_eq!(
        matched(execute_check(&opts).unwrap()),
        vec![false, false, true, true]
    );
}

#[test]
fn test_defines_bind_constants() {
    let mut opts = options("(LOW,HIGH]");
    opts.defines = vec![
        parse_define("LOW=20").unwrap(),
        parse_define("HIGH=25").unwrap(),
    ];
    opts.events = Some("[20, 22, 25, 26]".to_string());
    assert_eq!(
        matched(execute_check(&opts).unwrap()),
        vec![false, true, true, false]
    );
}

#[test]
fn test_runtime_error_is_reported() {
    let mut opts = options("filter(>0).take(5,3).sum().meet(>1)");
    opts.events = Some("[1]".to_string());
    assert!(matches!(
        execute_check(&opts),
        Err(CliError::Runtime(_))
    ));
}

// ============================================================================
// Syntax-only and Emit Modes
// ============================================================================

#[test]
fn test_syntax_only_skips_compilation() {
    let mut opts = options("undefinedCall(>1)");
    opts.syntax_only = true;
    assert!(matches!(
        execute_check(&opts).unwrap(),
        CheckResult::SyntaxValid
    ));
}

#[test]
fn test_syntax_only_reports_parse_errors() {
    let mut opts = options("{==0");
    opts.syntax_only = true;
    assert!(matches!(
        execute_check(&opts),
        Err(CliError::Compile { .. })
    ));
}

#[test]
fn test_emit_lists_fragments() {
    let mut opts = options("{==0}->{count(>1,2)}");
    opts.emit = true;
    let CheckResult::Compiled { fragments, .. } = execute_check(&opts).unwrap() else {
        panic!("expected compiled output");
    };
    assert_eq!(fragments.len(), 2);
    assert!(fragments[0].starts_with("count_"), "{:?}", fragments);
    assert!(fragments[1].starts_with("arrow_"), "{:?}", fragments);
}

#[test]
fn test_emit_needs_no_events() {
    let mut opts = options(">1");
    opts.emit = true;
    assert!(execute_check(&opts).is_ok());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_missing_events() {
    assert!(matches!(
        execute_check(&options(">1")),
        Err(CliError::NoInput)
    ));
}

#[test]
fn test_compile_error_points_at_source() {
    let err = execute_check(&options("{==0}->(1")).unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.starts_with("Parse error"), "{}", rendered);
    assert!(rendered.contains("{==0}->(1"), "{}", rendered);
    assert!(rendered.ends_with('^'), "{}", rendered);
}

#[test]
fn test_invalid_json() {
    assert!(matches!(parse_events("[1, 2"), Err(CliError::Json(_))));
}

#[test]
fn test_event_without_value() {
    assert!(matches!(
        parse_events(r#"[{"id":"x"}]"#),
        Err(CliError::InvalidEvent(_))
    ));
}

#[test]
fn test_bad_define() {
    assert!(matches!(parse_define("LOW"), Err(CliError::InvalidDefine(_))));
    assert!(matches!(parse_define("=3"), Err(CliError::InvalidDefine(_))));
}

// ============================================================================
// Event Parsing
// ============================================================================

#[test]
fn test_single_value_input() {
    let events = parse_events("42").unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].value, Value::Integer(42));
    assert_eq!(events[0].timestamp, 0);
}

#[test]
fn test_missing_fields_default_to_position() {
    let events = parse_events(r#"[{"value":1},{"value":2}]"#).unwrap();
    assert_eq!(events[1].id, "1");
    assert_eq!(events[1].timestamp, 1);
}

#[test]
fn test_define_values() {
    assert_eq!(parse_define("K=1.5").unwrap().1, Value::Float(1.5));
    assert_eq!(parse_define("ON=true").unwrap().1, Value::Boolean(true));
    assert_eq!(
        parse_define("MODE=auto").unwrap(),
        ("MODE".to_string(), Value::from("auto"))
    );
}
