// tests/parser_tests.rs

use rhythmix::ast::{BinOp, CompareOp, Expr, Literal, Statement};
use rhythmix::lexer::tokenize;
use rhythmix::parser::{ParseError, Parser, PriorityTable};

fn parse(input: &str) -> Expr {
    Parser::new(tokenize(input).unwrap())
        .parse()
        .unwrap_or_else(|e| panic!("failed to parse {:?}: {}", input, e))
}

fn parse_err(input: &str) -> ParseError {
    Parser::new(tokenize(input).unwrap())
        .parse()
        .expect_err("expected a parse error")
}

fn shape(input: &str) -> String {
    parse(input).to_string()
}

// ============================================================================
// Compare and Range Expressions
// ============================================================================

#[test]
fn test_compare_expression() {
    let Expr::Compare { op, operand } = parse(">=10") else {
        panic!("expected a compare expression");
    };
    assert_eq!(op, CompareOp::GreaterEqual);
    assert!(operand.is_leaf());
}

#[test]
fn test_compare_operand_uses_arithmetic_table() {
    assert_eq!(shape(">1+2*3"), ">(1+(2*3))");
    assert_eq!(shape(">1||<5"), "(>1||<5)");
}

#[test]
fn test_negative_compare_operand() {
    assert_eq!(shape("!=(-1)"), "!=-1");
    assert_eq!(shape("<-10"), "<-10");
}

#[test]
fn test_range_brackets() {
    for input in ["(1,5)", "(1,5]", "[1,5)", "[1,5]"] {
        assert_eq!(shape(input), input);
    }
}

#[test]
fn test_range_inclusivity_comes_from_brackets() {
    let Expr::Range { lower, upper } = parse("(1,5]") else {
        panic!("expected a range");
    };
    assert!(!lower.is_inclusive());
    assert!(upper.is_inclusive());
    assert_eq!(lower.lower_op(), CompareOp::GreaterThan);
    assert_eq!(upper.upper_op(), CompareOp::LessEqual);
}

#[test]
fn test_range_bounds_are_arithmetic() {
    assert_eq!(shape("[MAX-1,MAX+1]"), "[(MAX-1),(MAX+1)]");
    assert_eq!(shape("((1+0)*1,3]"), "(((1+0)*1),3]");
}

#[test]
fn test_parenthesised_expression_is_not_range() {
    let Expr::Binary { op, .. } = parse("(1+2)") else {
        panic!("expected a binary expression");
    };
    assert_eq!(op, BinOp::Add);
}

// ============================================================================
// Precedence
// ============================================================================

#[test]
fn test_logical_precedence() {
    assert_eq!(shape(">1||<5&&!=3"), "(>1||(<5&&!=3))");
    assert_eq!(shape("(1,5]&&!=3"), "((1,5]&&!=3)");
}

#[test]
fn test_left_associativity() {
    assert_eq!(shape("1-2-3"), "((1-2)-3)");
    assert_eq!(shape("8/4/2"), "((8/4)/2)");
}

#[test]
fn test_arithmetic_binds_tighter_than_comparison() {
    assert_eq!(shape("1+2==3"), "((1+2)==3)");
}

#[test]
fn test_unary_not() {
    assert_eq!(shape("!(>1)"), "!>1");
}

#[test]
fn test_custom_priority_table() {
    let table = PriorityTable::new(vec![vec!["+"]]);
    let mut parser = Parser::with_priority_table(tokenize("1+2").unwrap(), table.clone());
    assert!(parser.parse().is_ok());

    // `*` is not an operator under this table
    let mut parser = Parser::with_priority_table(tokenize("1*2").unwrap(), table);
    assert!(parser.parse().is_err());
}

#[test]
fn test_mark_and_rewind() {
    let mut parser = Parser::new(tokenize("1+2").unwrap());
    let mark = parser.mark();
    parser.parse_expression().unwrap();
    parser.rewind(mark);
    assert_eq!(parser.parse().unwrap().to_string(), "(1+2)");
}

#[test]
fn test_failed_attempt_consumes_nothing() {
    let mut parser = Parser::new(tokenize(">1").unwrap());
    let result: Option<()> = parser.attempt(|p| {
        p.parse_expression().ok()?;
        None
    });
    assert!(result.is_none());
    assert_eq!(parser.parse().unwrap().to_string(), ">1");
}

#[test]
fn test_table_restored_after_failed_sub_parse() {
    let mut parser = Parser::new(tokenize("1&&2").unwrap());
    let start = parser.mark();
    // `&&` is not part of the arithmetic table
    assert!(parser
        .with_table(PriorityTable::arithmetic(), |p| p.parse())
        .is_err());
    parser.rewind(start);
    assert_eq!(parser.parse().unwrap().to_string(), "(1&&2)");
}

// ============================================================================
// Arrows and Mutation Shorthand
// ============================================================================

#[test]
fn test_arrow_stages() {
    let Expr::Arrow(stages) = parse("{==0}->{==1}->{>5}") else {
        panic!("expected an arrow");
    };
    assert_eq!(stages.len(), 3);
    assert_eq!(stages[2].body.to_string(), ">5");
}

#[test]
fn test_single_stage_arrow() {
    let Expr::Arrow(stages) = parse("{count(>1,3)}") else {
        panic!("expected an arrow");
    };
    assert_eq!(stages.len(), 1);
}

#[test]
fn test_mutation_expands_to_arrow() {
    assert_eq!(shape("<0,1>"), shape("{==0}->{==1}"));
    assert_eq!(shape("<'a','b',3>"), "{=='a'}->{=='b'}->{==3}");
    assert_eq!(shape("<-1,2>"), "{==-1}->{==2}");
}

#[test]
fn test_less_than_is_not_mutation() {
    assert_eq!(shape("<10||>40"), "(<10||>40)");
}

#[test]
fn test_mutation_inside_logical_expression() {
    assert_eq!(shape("<0,1>||>5"), "({==0}->{==1}||>5)");
}

// ============================================================================
// Calls, Chains and Anonymous Functions
// ============================================================================

#[test]
fn test_chain_pipeline() {
    let Expr::Chain(calls) = parse("filter(>0).sum().meet(>10)") else {
        panic!("expected a chain");
    };
    let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["filter", "sum", "meet"]);
    assert_eq!(calls[0].args.len(), 1);
    assert!(calls[1].args.is_empty());
}

#[test]
fn test_single_call() {
    let Expr::Call(call) = parse("keep(>3,100ms)") else {
        panic!("expected a call");
    };
    assert_eq!(call.name, "keep");
    assert!(!call.strict);
    let Expr::Scalar(duration) = &call.args[1] else {
        panic!("expected a duration literal");
    };
    assert_eq!(duration.value, Literal::Duration(100));
}

#[test]
fn test_strict_marker() {
    let Expr::Call(call) = parse("count!(>4,3)") else {
        panic!("expected a call");
    };
    assert!(call.strict);
    assert_eq!(shape("count!(>4,3)"), "count!(>4,3)");
}

#[test]
fn test_detached_bang_is_not_strict() {
    assert!(Parser::new(tokenize("count !(>4,3)").unwrap()).parse().is_err());
}

#[test]
fn test_lambda_argument() {
    let Expr::Chain(calls) = parse("filter((v)->v>3).sum().meet(>0)") else {
        panic!("expected a chain");
    };
    let Expr::Lambda { params, body } = &calls[0].args[0] else {
        panic!("expected an anonymous function");
    };
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].name, "v");
    assert_eq!(body.to_string(), "(v>3)");
}

#[test]
fn test_nested_chain_in_arrow() {
    assert_eq!(
        shape("{filter(>1).count().meet(>=2)}->{==0}"),
        "{filter(>1).count().meet(>=2)}->{==0}"
    );
}

// ============================================================================
// Programs
// ============================================================================

#[test]
fn test_program_preamble() {
    let program = Parser::new(tokenize("let LOW = 20; let HIGH = LOW + 5; (LOW,HIGH]").unwrap())
        .parse_program()
        .unwrap();
    assert_eq!(program.statements.len(), 3);
    assert!(matches!(program.statements[0], Statement::Declare { .. }));
    assert!(matches!(program.statements[2], Statement::Expr(Expr::Range { .. })));
}

#[test]
fn test_single_expression_program() {
    let program = Parser::new(tokenize(">1").unwrap()).parse_program().unwrap();
    assert!(program.as_single_expr().is_some());
}

#[test]
fn test_if_else_chain() {
    let source = "if (MODE == 1) { let T = 5 } else if (MODE == 2) { let T = 7 } else { let T = 10 }; >T";
    let program = Parser::new(tokenize(source).unwrap()).parse_program().unwrap();
    let Statement::If { else_branch, .. } = &program.statements[0] else {
        panic!("expected an if statement");
    };
    assert!(matches!(
        else_branch.as_deref(),
        Some(Statement::If { .. })
    ));
    assert_eq!(program.statements.len(), 2);
}

#[test]
fn test_assignment_and_return() {
    let program = Parser::new(tokenize("let A = 1; A = A + 1; return >A").unwrap())
        .parse_program()
        .unwrap();
    assert!(matches!(program.statements[1], Statement::Assign { .. }));
    assert!(matches!(program.statements[2], Statement::Return(_)));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unmatched_arrow_brace() {
    let err = parse_err("{==0");
    assert!(matches!(err, ParseError::UnmatchedBracket { .. }));
}

#[test]
fn test_unmatched_range() {
    let err = parse_err("[1,5");
    let ParseError::UnmatchedBracket { open, found } = err else {
        panic!("expected an unmatched bracket");
    };
    assert_eq!(open.text, "[");
    assert!(found.is_eof());
}

#[test]
fn test_compare_without_operand() {
    assert!(matches!(parse_err(">"), ParseError::UnexpectedToken { .. }));
}

#[test]
fn test_trailing_tokens() {
    let err = parse_err("1 2");
    assert_eq!(err.token().text, "2");
}

#[test]
fn test_chain_element_must_be_call() {
    assert!(matches!(
        parse_err("filter(>0).sum"),
        ParseError::InvalidChain { .. }
    ));
    assert!(matches!(
        parse_err("filter(>0).(1)"),
        ParseError::InvalidChain { .. }
    ));
}

#[test]
fn test_keyword_cannot_start_statement() {
    let err = Parser::new(tokenize("else >1").unwrap())
        .parse_program()
        .unwrap_err();
    assert!(matches!(err, ParseError::DisallowedNesting { .. }));
}

#[test]
fn test_error_carries_position() {
    let err = parse_err("{==0}->(1");
    assert_eq!(err.position().column, 8);
}
