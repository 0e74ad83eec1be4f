//! # Rhythmix Rule Language - Abstract Syntax Tree
//!
//! This module defines the Abstract Syntax Tree (AST) for Rhythmix rules,
//! one-line conditions evaluated against a stream of sensor readings.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes (compare, range, arrow, chain, ...)
//! - **[operators]** - Binary, unary and compare operators
//! - **[statements]** - Compile-time preamble statements and programs
//!
//! ## Quick Start
//!
//! ```text
//! filter(>0).window(3).sum().meet(>10)
//! ```
//!
//! Keeps the positive readings, sums every run of three and reports whether
//! the sum exceeds ten.
//!
//! ## Core Concepts
//!
//! ### The value under test
//!
//! Compare and range expressions have no left operand. They test "the
//! current value": the event value at the top level and inside `filter`,
//! the aggregate inside `meet`.
//!
//! ```text
//! (1,5]&&!=3
//! ```
//!
//! ### Arrow sequences
//!
//! Stages must be satisfied by successive events, in order:
//!
//! ```text
//! {==0}->{==1}
//! <0,1>          // shorthand for the line above
//! ```
//!
//! ### Chain pipelines
//!
//! A pipeline admits values (`filter`), retains them (`collect`, `limit`,
//! `window`, `take`), reduces them (`sum`, `avg`, `hitRate`, ...) and decides
//! (`meet`), optionally wiping its state afterwards (`clear`).
//!
//! ### Stateful predicates
//!
//! ```text
//! count!(>4,3)      // three consecutive readings above 4
//! keep(>3,100ms)    // above 3 for at least 100ms
//! {>1}->{delay(1s)} // one second after a reading above 1
//! ```
pub mod tokens;
pub mod expressions;
pub mod operators;
pub mod statements;

pub use tokens::{Position, Token, TokenKind};
pub use expressions::{ArrowStage, Bound, Call, Expr, Ident, Literal, Scalar};
pub use operators::{BinOp, CompareOp, UnaryOp};
pub use statements::{Block, Program, Statement};
