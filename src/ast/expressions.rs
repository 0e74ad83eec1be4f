use std::fmt;

use crate::ast::{BinOp, CompareOp, Position, Token, UnaryOp};

/// Abstract Syntax Tree node representing a parsed rule expression.
///
/// Every variant owns exactly the children its kind needs, so arity never has
/// to be checked after construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 3.5
    /// 'on'
    /// 100ms
    /// ```
    Scalar(Scalar),

    /// Reference to a constant bound in the environment, or to the parameter
    /// of an enclosing anonymous function
    Variable(Ident),

    /// Infix operation
    ///
    /// # Examples
    /// ```text
    /// (1+MAX)/K
    /// >1 && <5
    /// ```
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Prefix operation (`!`, `++`, `--`)
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Comparison of the value under test against one operand
    ///
    /// # Examples
    /// ```text
    /// >=10
    /// !=(-1)
    /// ```
    Compare { op: CompareOp, operand: Box<Expr> },

    /// Bracketed interval
    ///
    /// # Examples
    /// ```text
    /// (1,5]
    /// [0,100]
    /// ```
    Range { lower: Bound, upper: Bound },

    /// Temporal sequence of stage conditions
    ///
    /// # Examples
    /// ```text
    /// {==0}->{==1}
    /// {count(>1,3)}->{delay(100ms)}
    /// ```
    Arrow(Vec<ArrowStage>),

    /// Single function call (stateful predicate or UDF)
    ///
    /// # Examples
    /// ```text
    /// count!(>4,3)
    /// keep(>3,100ms)
    /// ```
    Call(Call),

    /// Pipeline of at least two calls joined by `.`
    ///
    /// # Examples
    /// ```text
    /// filter(>0).window(3).sum().meet(>10)
    /// ```
    Chain(Vec<Call>),

    /// Anonymous function `(v) -> body`
    Lambda { params: Vec<Ident>, body: Box<Expr> },
}

/// Literal payload of a scalar node.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Str(String),
    Boolean(bool),
    /// Milliseconds
    Duration(i64),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::Float(n) => write!(f, "{:?}", n),
            Literal::Str(s) => write!(f, "'{}'", s),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Duration(ms) => write!(f, "{}ms", ms),
        }
    }
}

/// Scalar leaf with the token it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    pub value: Literal,
    pub token: Token,
}

/// Identifier leaf with the token it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub token: Token,
}

/// One side of a range expression.
///
/// `bracket` is the delimiter token (`(`, `[`, `)` or `]`); it alone decides
/// whether the bound is inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub expr: Box<Expr>,
    pub bracket: Token,
}

impl Bound {
    pub fn is_inclusive(&self) -> bool {
        self.bracket.is_bracket("[") || self.bracket.is_bracket("]")
    }

    /// Comparison the value under test must satisfy against this bound when
    /// it is the lower bound.
    pub fn lower_op(&self) -> CompareOp {
        if self.is_inclusive() {
            CompareOp::GreaterEqual
        } else {
            CompareOp::GreaterThan
        }
    }

    /// Same as [`Bound::lower_op`] for the upper bound.
    pub fn upper_op(&self) -> CompareOp {
        if self.is_inclusive() {
            CompareOp::LessEqual
        } else {
            CompareOp::LessThan
        }
    }
}

/// One `{...}` stage of an arrow expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrowStage {
    pub body: Expr,
    /// The opening `{`
    pub token: Token,
}

/// A call `name(args)` or `name!(args)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    /// Set by the `!` marker directly after the name
    pub strict: bool,
    pub args: Vec<Expr>,
    /// The name token
    pub token: Token,
}

impl Call {
    pub fn position(&self) -> Position {
        self.token.position
    }
}

impl Expr {
    /// Position of the first token of this expression.
    pub fn position(&self) -> Position {
        match self {
            Expr::Scalar(s) => s.token.position,
            Expr::Variable(v) => v.token.position,
            Expr::Binary { left, .. } => left.position(),
            Expr::Unary { operand, .. } => operand.position(),
            Expr::Compare { operand, .. } => operand.position(),
            Expr::Range { lower, .. } => lower.bracket.position,
            Expr::Arrow(stages) => stages
                .first()
                .map(|s| s.token.position)
                .unwrap_or_default(),
            Expr::Call(call) => call.position(),
            Expr::Chain(calls) => calls.first().map(Call::position).unwrap_or_default(),
            Expr::Lambda { params, body } => params
                .first()
                .map(|p| p.token.position)
                .unwrap_or_else(|| body.position()),
        }
    }

    /// Leaves are scalars and plain variables.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Expr::Scalar(_) | Expr::Variable(_))
    }

    /// Whether an arrow expression appears anywhere in this tree.
    pub fn contains_arrow(&self) -> bool {
        match self {
            Expr::Arrow(_) => true,
            Expr::Scalar(_) | Expr::Variable(_) => false,
            Expr::Binary { left, right, .. } => left.contains_arrow() || right.contains_arrow(),
            Expr::Unary { operand, .. } | Expr::Compare { operand, .. } => {
                operand.contains_arrow()
            }
            Expr::Range { lower, upper } => {
                lower.expr.contains_arrow() || upper.expr.contains_arrow()
            }
            Expr::Call(call) => call.args.iter().any(Expr::contains_arrow),
            Expr::Chain(calls) => calls
                .iter()
                .any(|c| c.args.iter().any(Expr::contains_arrow)),
            Expr::Lambda { body, .. } => body.contains_arrow(),
        }
    }
}

fn write_call(f: &mut fmt::Formatter<'_>, call: &Call) -> fmt::Result {
    write!(f, "{}", call.name)?;
    if call.strict {
        write!(f, "!")?;
    }
    write!(f, "(")?;
    for (i, arg) in call.args.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{}", arg)?;
    }
    write!(f, ")")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Scalar(s) => write!(f, "{}", s.value),
            Expr::Variable(v) => write!(f, "{}", v.name),
            Expr::Binary { op, left, right } => write!(f, "({}{}{})", left, op, right),
            Expr::Unary { op, operand } => write!(f, "{}{}", op, operand),
            Expr::Compare { op, operand } => write!(f, "{}{}", op, operand),
            Expr::Range { lower, upper } => write!(
                f,
                "{}{},{}{}",
                lower.bracket.text, lower.expr, upper.expr, upper.bracket.text
            ),
            Expr::Arrow(stages) => {
                for (i, stage) in stages.iter().enumerate() {
                    if i > 0 {
                        write!(f, "->")?;
                    }
                    write!(f, "{{{}}}", stage.body)?;
                }
                Ok(())
            }
            Expr::Call(call) => write_call(f, call),
            Expr::Chain(calls) => {
                for (i, call) in calls.iter().enumerate() {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write_call(f, call)?;
                }
                Ok(())
            }
            Expr::Lambda { params, body } => {
                let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
                write!(f, "({})->{}", names.join(","), body)
            }
        }
    }
}
