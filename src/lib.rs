pub mod ast;
pub mod cli;
pub mod compiler;
pub mod infer;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod translator;
pub mod udf;
pub mod value;

pub use ast::{BinOp, CompareOp, Expr, Position, Program, Statement, Token, TokenKind};
pub use compiler::{CompileError, CompiledMatcher, Compiler, compile};
pub use infer::{TypeInferError, ValueType, infer};
pub use lexer::{LexError, Lexer, tokenize};
pub use parser::{ParseError, Parser, PriorityTable};
pub use runtime::{Environment, RuntimeError};
pub use translator::{
    Code, Fragment, NameScope, TranslateError, TranslationContext, translate, translate_program,
};
pub use udf::{CalculatorUdf, FilterUdf, MeetUdf, Udf, UdfError, UdfKind, UdfRegistry};
pub use value::{Event, Value};
