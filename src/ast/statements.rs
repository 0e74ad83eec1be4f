use crate::ast::{Expr, Ident};

/// Statements of a rule program.
///
/// A program is a compile-time preamble that binds constants, followed by
/// the rule expression itself.
///
/// # Examples
/// ```text
/// let LOW = 20; let HIGH = LOW + 5; (LOW,HIGH]
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Constant declaration (`let NAME = expr`)
    Declare { name: Ident, value: Expr },

    /// Rebinding of an existing constant (`NAME = expr`)
    Assign { name: Ident, value: Expr },

    /// Conditional branch decided at compile time
    ///
    /// # Examples
    /// ```text
    /// if (MODE == 1) { let T = 5 } else { let T = 10 }
    /// ```
    If {
        condition: Expr,
        then_branch: Block,
        /// Either a [`Statement::Block`] or a nested [`Statement::If`]
        else_branch: Option<Box<Statement>>,
    },

    /// Selects the rule explicitly (`return expr`)
    Return(Expr),

    /// Braced statement list
    Block(Block),

    /// Bare expression; only allowed as the final statement, where it is the rule
    Expr(Expr),
}

/// `{ statement; statement }`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
}

/// A whole parsed source unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    /// The expression of a program that consists of nothing else.
    pub fn as_single_expr(&self) -> Option<&Expr> {
        match self.statements.as_slice() {
            [Statement::Expr(expr)] => Some(expr),
            _ => None,
        }
    }
}
