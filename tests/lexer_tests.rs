// tests/lexer_tests.rs

use rhythmix::ast::TokenKind;
use rhythmix::lexer::{Lexer, tokenize};

fn texts(input: &str) -> Vec<String> {
    tokenize(input)
        .unwrap()
        .into_iter()
        .filter(|t| !t.is_eof())
        .map(|t| t.text)
        .collect()
}

fn kinds(input: &str) -> Vec<TokenKind> {
    tokenize(input)
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

// ============================================================================
// Operators and Brackets
// ============================================================================

#[test]
fn test_single_char_operators() {
    for op in [">", "<", "!", "=", "+", "-", "*", "/", "&", "|", "^", ",", ".", ";"] {
        let mut lexer = Lexer::new(op);
        let token = lexer.next_token().unwrap();
        assert_eq!(token.kind, TokenKind::Operator, "Failed for input: {}", op);
        assert_eq!(token.text, op);
        assert!(lexer.next_token().unwrap().is_eof());
    }
}

#[test]
fn test_two_char_operators() {
    for op in ["->", "++", "--", "==", "!=", ">=", "<=", "<<", ">>", "&&", "||"] {
        let tokens = tokenize(op).unwrap();
        assert_eq!(tokens.len(), 2, "Failed for input: {}", op);
        assert!(tokens[0].is_operator(op), "Failed for input: {}", op);
    }
}

#[test]
fn test_brackets() {
    let tokens = tokenize("([{}])").unwrap();
    let brackets: Vec<&str> = tokens[..6].iter().map(|t| t.text.as_str()).collect();
    assert_eq!(brackets, vec!["(", "[", "{", "}", "]", ")"]);
    assert!(tokens[..6].iter().all(|t| t.kind == TokenKind::Bracket));
}

#[test]
fn test_two_char_vs_single_char() {
    assert_eq!(texts("< =="), vec!["<", "=="]);
    assert_eq!(texts("<="), vec!["<="]);
    assert_eq!(texts("!="), vec!["!="]);
    assert_eq!(texts("! ="), vec!["!", "="]);
}

// ============================================================================
// Numbers and Durations
// ============================================================================

#[test]
fn test_integers_and_floats() {
    assert_eq!(
        kinds("42 3.5"),
        vec![TokenKind::Integer, TokenKind::Float, TokenKind::Eof]
    );
    assert_eq!(texts("10.25"), vec!["10.25"]);
}

#[test]
fn test_dot_after_integer_is_operator() {
    // `1.` without a digit after the dot is not a float
    assert_eq!(texts("1.x"), vec!["1", ".", "x"]);
}

#[test]
fn test_negative_literals() {
    assert_eq!(texts("<-10"), vec!["<", "-10"]);
    assert_eq!(texts("(-1,5)"), vec!["(", "-1", ",", "5", ")"]);
    assert_eq!(texts("!=(-1)"), vec!["!=", "(", "-1", ")"]);
    assert_eq!(texts("take(-3,-1)"), vec!["take", "(", "-3", ",", "-1", ")"]);
    assert_eq!(texts("-2.5"), vec!["-2.5"]);
}

#[test]
fn test_minus_after_operand_is_subtraction() {
    assert_eq!(texts("1-10"), vec!["1", "-", "10"]);
    assert_eq!(texts("MAX-1"), vec!["MAX", "-", "1"]);
    assert_eq!(texts("(2)-1"), vec!["(", "2", ")", "-", "1"]);
}

#[test]
fn test_durations() {
    let tokens = tokenize("100ms 1s 5m 2h 1d").unwrap();
    let millis: Vec<Option<i64>> = tokens[..5].iter().map(|t| t.duration_ms()).collect();
    assert_eq!(
        millis,
        vec![
            Some(100),
            Some(1_000),
            Some(300_000),
            Some(7_200_000),
            Some(86_400_000)
        ]
    );
    assert!(tokens[..5].iter().all(|t| t.kind == TokenKind::Duration));
}

#[test]
fn test_unit_prefix_is_not_duration() {
    // `5sec` is a number followed by an identifier
    assert_eq!(
        kinds("5sec"),
        vec![TokenKind::Integer, TokenKind::Variable, TokenKind::Eof]
    );
}

#[test]
fn test_duration_ms_only_for_durations() {
    let tokens = tokenize("100").unwrap();
    assert_eq!(tokens[0].duration_ms(), None);
}

// ============================================================================
// Identifiers, Keywords and Literals
// ============================================================================

#[test]
fn test_keywords_and_type_names() {
    let tokens = tokenize("let if else return int float bool string").unwrap();
    assert!(tokens[..8].iter().all(|t| t.kind == TokenKind::Keyword));
    assert!(!tokens[0].is_type_name());
    assert!(tokens[4].is_type_name());
    assert!(tokens[7].is_type_name());
}

#[test]
fn test_booleans_are_scalars() {
    let tokens = tokenize("true false").unwrap();
    assert_eq!(tokens[0].kind, TokenKind::Boolean);
    assert!(tokens[1].is_scalar());
}

#[test]
fn test_identifiers() {
    let tokens = tokenize("positiveFilter hit_rate2").unwrap();
    assert!(tokens[0].is_variable());
    assert_eq!(tokens[1].text, "hit_rate2");
}

#[test]
fn test_strings() {
    let tokens = tokenize(r#"'on' "off" 'it\'s'"#).unwrap();
    assert_eq!(tokens[0].kind, TokenKind::Str);
    assert_eq!(tokens[0].text, "on");
    assert_eq!(tokens[1].text, "off");
    assert_eq!(tokens[2].text, "it's");
}

#[test]
fn test_classification_predicates() {
    let tokens = tokenize("x 1 2.0 'a' 5s").unwrap();
    assert!(tokens[0].is_variable() && !tokens[0].is_scalar());
    assert!(tokens[1].is_number() && tokens[1].is_scalar());
    assert!(tokens[2].is_number());
    assert!(!tokens[3].is_number() && tokens[3].is_scalar());
    assert!(!tokens[4].is_number() && tokens[4].is_scalar());
}

// ============================================================================
// Positions
// ============================================================================

#[test]
fn test_positions_track_lines_and_columns() {
    let tokens = tokenize("let A = 1;\n>A").unwrap();
    let gt = tokens.iter().find(|t| t.is_operator(">")).unwrap();
    assert_eq!(gt.position.line, 2);
    assert_eq!(gt.position.column, 1);
    assert_eq!(gt.position.offset, 11);
}

#[test]
fn test_token_stream_ends_with_eof() {
    let tokens = tokenize("").unwrap();
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is_eof());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unexpected_character() {
    let err = tokenize(">1 # comment").unwrap_err();
    assert!(err.message.contains('#'));
    assert_eq!(err.position.column, 4);
}

#[test]
fn test_unterminated_string() {
    let err = tokenize("=='open").unwrap_err();
    assert!(err.message.contains("Unterminated"));
    assert_eq!(err.position.column, 3);
}

#[test]
fn test_invalid_escape() {
    assert!(tokenize(r"=='\q'").is_err());
}
