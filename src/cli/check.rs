//! Compile rhythmix rules and replay events through them

use super::{CliError, event_to_json, parse_events};
use crate::{Compiler, Lexer, Parser, Value};

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The rule to compile
    pub rule: String,
    /// Events as JSON (array, single value or one value per line)
    pub events: Option<String>,
    /// Constants bound before compiling
    pub defines: Vec<(String, Value)>,
    /// Only validate syntax, don't compile or execute
    pub syntax_only: bool,
    /// Print the compiled fragments instead of executing
    pub emit: bool,
}

/// Result of a check operation
#[derive(Debug)]
pub enum CheckResult {
    /// Syntax validation passed
    SyntaxValid,
    /// Rule compiled; target text of the entry code and of every fragment
    Compiled {
        entry: String,
        fragments: Vec<String>,
    },
    /// One result object per event, in input order
    Matched(serde_json::Value),
}

fn compile_error(error: impl Into<crate::CompileError>, rule: &str) -> CliError {
    CliError::Compile {
        error: error.into(),
        source: rule.to_string(),
    }
}

/// Execute a rhythmix check operation
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    let rule = &options.rule;

    if options.syntax_only {
        let tokens = Lexer::new(rule)
            .tokenize()
            .map_err(|e| compile_error(e, rule))?;
        Parser::new(tokens)
            .parse_program()
            .map_err(|e| compile_error(e, rule))?;
        return Ok(CheckResult::SyntaxValid);
    }

    let compiler = options
        .defines
        .iter()
        .fold(Compiler::new(), |c, (name, value)| {
            c.constant(name.clone(), value.clone())
        });
    let mut matcher = compiler
        .compile(rule)
        .map_err(|e| compile_error(e, rule))?;

    if options.emit {
        return Ok(CheckResult::Compiled {
            entry: matcher.entry().to_string(),
            fragments: matcher.fragments().iter().map(|f| f.to_string()).collect(),
        });
    }

    let text = options.events.as_ref().ok_or(CliError::NoInput)?;
    let events = parse_events(text)?;

    let mut results = Vec::with_capacity(events.len());
    for event in &events {
        let matched = matcher.execute(event)?;
        let mut row = event_to_json(event);
        row["matched"] = serde_json::Value::Bool(matched);
        results.push(row);
    }

    Ok(CheckResult::Matched(serde_json::Value::Array(results)))
}
