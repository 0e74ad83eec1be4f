//! Compile entry points and the executable matcher.
//!
//! ```
//! use rhythmix::{Event, compile};
//!
//! let mut matcher = compile("{==0}->{==1}").unwrap();
//! assert!(!matcher.execute(&Event::at(0, 0)).unwrap());
//! assert!(matcher.execute(&Event::at(1, 10)).unwrap());
//! ```

use std::fmt;

use crate::{
    ast::Position,
    infer::TypeInferError,
    lexer::{LexError, Lexer},
    parser::{ParseError, Parser},
    runtime::{Environment, Frame, RuntimeError, eval},
    translator::{Code, Fragment, TranslateError, TranslationContext, translate_program},
    udf::UdfRegistry,
    value::{Event, Value},
};

/// Any failure of [`compile`].
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    Lex(LexError),
    Parse(ParseError),
    Infer(TypeInferError),
    Translate(TranslateError),
}

impl CompileError {
    pub fn position(&self) -> Option<Position> {
        match self {
            CompileError::Lex(e) => Some(e.position),
            CompileError::Parse(e) => Some(e.position()),
            CompileError::Infer(e) => Some(e.position()),
            CompileError::Translate(e) => e.position(),
        }
    }

    /// The error message followed, when the position is known, by the
    /// offending source line and a caret under the error column.
    pub fn render(&self, source: &str) -> String {
        let mut out = self.to_string();
        let Some(position) = self.position() else {
            return out;
        };
        if let Some(line) = source.lines().nth(position.line.saturating_sub(1)) {
            out.push_str("\n  ");
            out.push_str(line);
            out.push_str("\n  ");
            out.push_str(&" ".repeat(position.column.saturating_sub(1)));
            out.push('^');
        }
        out
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Lex(e) => write!(f, "Lexical error: {}", e),
            CompileError::Parse(e) => write!(f, "Parse error: {}", e),
            CompileError::Infer(e) => write!(f, "{}", e),
            CompileError::Translate(e) => write!(f, "Translation error: {}", e),
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Lex(e) => Some(e),
            CompileError::Parse(e) => Some(e),
            CompileError::Infer(e) => Some(e),
            CompileError::Translate(e) => Some(e),
        }
    }
}

impl From<LexError> for CompileError {
    fn from(e: LexError) -> Self {
        CompileError::Lex(e)
    }
}

impl From<ParseError> for CompileError {
    fn from(e: ParseError) -> Self {
        CompileError::Parse(e)
    }
}

impl From<TypeInferError> for CompileError {
    fn from(e: TypeInferError) -> Self {
        CompileError::Infer(e)
    }
}

impl From<TranslateError> for CompileError {
    fn from(e: TranslateError) -> Self {
        match e {
            TranslateError::Type(inner) => CompileError::Infer(inner),
            other => CompileError::Translate(other),
        }
    }
}

/// Compiles `source` with the builtin UDFs and no predefined constants.
pub fn compile(source: &str) -> Result<CompiledMatcher, CompileError> {
    Compiler::new().compile(source)
}

/// Configurable compiler for hosts that predefine constants or register
/// their own UDFs.
///
/// ```
/// use rhythmix::{Compiler, Event, UdfRegistry};
///
/// let mut udfs = UdfRegistry::with_builtins();
/// udfs.register_meet("aboveTen", |v: f64| v > 10.0);
///
/// let mut matcher = Compiler::new()
///     .constant("LOW", 20)
///     .udfs(udfs)
///     .compile("filter(>LOW).sum().aboveTen()")
///     .unwrap();
/// assert!(matcher.execute(&Event::at(25, 0)).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct Compiler {
    constants: Vec<(String, Value)>,
    udfs: UdfRegistry,
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            constants: Vec::new(),
            udfs: UdfRegistry::with_builtins(),
        }
    }

    pub fn constant(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constants.push((name.into(), value.into()));
        self
    }

    /// Replaces the UDF registry (builtins included) used for name lookups.
    pub fn udfs(mut self, registry: UdfRegistry) -> Self {
        self.udfs = registry;
        self
    }

    pub fn compile(&self, source: &str) -> Result<CompiledMatcher, CompileError> {
        let tokens = Lexer::new(source).tokenize()?;
        let program = Parser::new(tokens).parse_program()?;

        let mut env = Environment::new();
        for (name, value) in &self.constants {
            env.define(name, value.clone());
        }

        let mut ctx = TranslationContext::new();
        let entry = translate_program(&program, &mut ctx, &mut env, &self.udfs)?;
        let fragments = ctx.into_fragments();

        log::debug!(
            "compiled {:?}: entry {} with {} fragment(s)",
            source,
            entry,
            fragments.len()
        );
        for fragment in &fragments {
            log::trace!("  {}", fragment);
        }

        Ok(CompiledMatcher {
            source: source.to_string(),
            entry,
            fragments,
            env,
            udfs: self.udfs.clone(),
        })
    }
}

/// A compiled rule together with its runtime state.
///
/// Feed events in order with [`execute`](CompiledMatcher::execute). One
/// matcher is meant for one stream; it is not safe to share between
/// threads without external locking.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    source: String,
    entry: Code,
    fragments: Vec<Fragment>,
    env: Environment,
    udfs: UdfRegistry,
}

impl CompiledMatcher {
    /// Feeds one event and reports whether the rule holds after it.
    pub fn execute(&mut self, event: &Event) -> Result<bool, RuntimeError> {
        let frame = Frame::new(event, &self.fragments, &self.udfs);
        let result = eval(&self.entry, &event.value, &frame, &mut self.env)?.as_bool();
        log::trace!("{} -> {}", event, result);
        Ok(result)
    }

    /// Feeds `events` in order and returns the result for the last one
    /// (`false` when there are none).
    pub fn execute_all<'e>(
        &mut self,
        events: impl IntoIterator<Item = &'e Event>,
    ) -> Result<bool, RuntimeError> {
        let mut last = false;
        for event in events {
            last = self.execute(event)?;
        }
        Ok(last)
    }

    /// Forgets every retained value and sequence position.
    pub fn reset(&mut self) {
        self.env.clear_states();
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn entry(&self) -> &Code {
        &self.entry
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }
}
