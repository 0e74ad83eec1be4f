//! AST → executable fragments.
//!
//! Translation walks the tree bottom-up. Stateless nodes become inline
//! [`Code`]; every stateful construct gets a fresh name from the
//! [`NameScope`], is appended to [`TranslationContext::codes`] and is
//! referenced by a zero-argument call.

use std::fmt;

use crate::{
    ast::{
        BinOp, Bound, Call, CompareOp, Expr, Ident, Literal, Position, Program, Statement, UnaryOp,
    },
    infer::{TypeInferError, infer},
    runtime::{Environment, fold},
    udf::{UdfError, UdfKind, UdfRegistry},
    value::Value,
};

mod chain;
pub mod fragment;
mod function;
mod scope;

pub use fragment::{
    ArrowPlan, Calculator, ChainPlan, Code, FilterStep, Fragment, FragmentBody, FunctionPlan,
    Meet, Sampler, Span,
};
pub use scope::{NAME_SEPARATOR, NameScope, TranslationContext};

/// Errors raised while turning a parsed rule into fragments.
#[derive(Debug, Clone, PartialEq)]
pub enum TranslateError {
    /// Identifier with no binding
    UndefinedVariable { name: String, position: Position },

    /// Call to a name that is neither a function nor a registered UDF
    UnknownFunction { name: String, position: Position },

    /// Chain element with no chain meaning
    UnknownOperator { name: String, position: Position },

    /// Pipeline whose shape is not allowed
    InvalidChain { message: String, position: Position },

    /// Bad argument count, type or value for a call
    InvalidArgument {
        function: String,
        message: String,
        position: Position,
    },

    /// Compare operand that is not a plain constant
    InvalidCompare { message: String, position: Position },

    /// An arrow inside an arrow stage
    NestedArrow { position: Position },

    /// Preamble expression that cannot be evaluated at compile time
    NotConstant { message: String, position: Position },

    /// Program with no rule expression
    MissingRule,

    /// Operand type validation failed
    Type(TypeInferError),

    /// UDF lookup failed
    Udf { error: UdfError, position: Position },
}

impl TranslateError {
    pub fn position(&self) -> Option<Position> {
        match self {
            TranslateError::UndefinedVariable { position, .. }
            | TranslateError::UnknownFunction { position, .. }
            | TranslateError::UnknownOperator { position, .. }
            | TranslateError::InvalidChain { position, .. }
            | TranslateError::InvalidArgument { position, .. }
            | TranslateError::InvalidCompare { position, .. }
            | TranslateError::NestedArrow { position }
            | TranslateError::NotConstant { position, .. }
            | TranslateError::Udf { position, .. } => Some(*position),
            TranslateError::Type(e) => Some(e.position()),
            TranslateError::MissingRule => None,
        }
    }

    pub(crate) fn argument(call: &Call, message: impl Into<String>) -> Self {
        TranslateError::InvalidArgument {
            function: call.name.clone(),
            message: message.into(),
            position: call.position(),
        }
    }
}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslateError::UndefinedVariable { name, .. } => {
                write!(f, "Undefined variable: '{}'", name)
            }
            TranslateError::UnknownFunction { name, .. } => {
                write!(f, "Unknown function '{}'", name)
            }
            TranslateError::UnknownOperator { name, .. } => {
                write!(f, "chain expression does not support '{}' operator", name)
            }
            TranslateError::InvalidChain { message, .. } => write!(f, "{}", message),
            TranslateError::InvalidArgument {
                function, message, ..
            } => write!(f, "Invalid argument for '{}': {}", function, message),
            TranslateError::InvalidCompare { message, .. } => write!(f, "{}", message),
            TranslateError::NestedArrow { .. } => {
                write!(f, "Arrow expressions cannot be nested")
            }
            TranslateError::NotConstant { message, .. } => write!(f, "{}", message),
            TranslateError::MissingRule => write!(f, "Program has no rule expression"),
            TranslateError::Type(e) => write!(f, "{}", e),
            TranslateError::Udf { error, .. } => write!(f, "{}", error),
        }
    }
}

impl std::error::Error for TranslateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TranslateError::Type(e) => Some(e),
            TranslateError::Udf { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<TypeInferError> for TranslateError {
    fn from(e: TypeInferError) -> Self {
        TranslateError::Type(e)
    }
}

/// Names of the stateful functions usable outside chains.
pub const FUNCTIONS: [&str; 4] = ["count", "keep", "delay", "slope"];

/// Translates one expression, appending its fragments to `ctx`, and returns
/// the code that evaluates it.
pub fn translate(
    expr: &Expr,
    ctx: &mut TranslationContext,
    env: &Environment,
    udfs: &UdfRegistry,
) -> Result<Code, TranslateError> {
    Translator::new(env, udfs).translate(expr, ctx)
}

/// Runs the compile-time preamble of `program` against `env` and
/// translates its rule.
///
/// The rule is the first `return` reached, or else the final bare
/// expression.
pub fn translate_program(
    program: &Program,
    ctx: &mut TranslationContext,
    env: &mut Environment,
    udfs: &UdfRegistry,
) -> Result<Code, TranslateError> {
    match run_statements(&program.statements, true, ctx, env, udfs)? {
        Some(code) => Ok(code),
        None => Err(TranslateError::MissingRule),
    }
}

fn run_statements(
    statements: &[Statement],
    top_level: bool,
    ctx: &mut TranslationContext,
    env: &mut Environment,
    udfs: &UdfRegistry,
) -> Result<Option<Code>, TranslateError> {
    for (i, statement) in statements.iter().enumerate() {
        let last = top_level && i + 1 == statements.len();

        match statement {
            Statement::Declare { name, value } => {
                let value = Translator::new(env, udfs).constant(value)?;
                log::debug!("let {} = {}", name.name, value);
                env.define(&name.name, value);
            }
            Statement::Assign { name, value } => {
                if env.constant(&name.name).is_none() {
                    return Err(TranslateError::UndefinedVariable {
                        name: name.name.clone(),
                        position: name.token.position,
                    });
                }
                let value = Translator::new(env, udfs).constant(value)?;
                env.define(&name.name, value);
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let taken = Translator::new(env, udfs).constant(condition)?.as_bool();
                let result = if taken {
                    run_statements(&then_branch.statements, false, ctx, env, udfs)?
                } else if let Some(other) = else_branch {
                    run_statements(std::slice::from_ref(other.as_ref()), false, ctx, env, udfs)?
                } else {
                    None
                };
                if result.is_some() {
                    return Ok(result);
                }
            }
            Statement::Block(block) => {
                if let Some(code) = run_statements(&block.statements, false, ctx, env, udfs)? {
                    return Ok(Some(code));
                }
            }
            Statement::Return(expr) => {
                return translate(expr, ctx, env, udfs).map(Some);
            }
            Statement::Expr(expr) => {
                if !last {
                    return Err(TranslateError::NotConstant {
                        message: "Only the final statement may be a bare expression".to_string(),
                        position: expr.position(),
                    });
                }
                return translate(expr, ctx, env, udfs).map(Some);
            }
        }
    }
    Ok(None)
}

/// Recursive translator. Holds the read-only inputs of one translation;
/// the mutable output lives in the [`TranslationContext`] passed through
/// every call.
pub struct Translator<'a> {
    env: &'a Environment,
    udfs: &'a UdfRegistry,
    /// Parameter of the enclosing anonymous function
    param: Option<String>,
}

impl<'a> Translator<'a> {
    pub fn new(env: &'a Environment, udfs: &'a UdfRegistry) -> Self {
        Translator {
            env,
            udfs,
            param: None,
        }
    }

    pub fn udfs(&self) -> &UdfRegistry {
        self.udfs
    }

    pub fn env(&self) -> &Environment {
        self.env
    }

    pub fn translate(
        &mut self,
        expr: &Expr,
        ctx: &mut TranslationContext,
    ) -> Result<Code, TranslateError> {
        match expr {
            Expr::Scalar(scalar) => Ok(Code::Literal(literal_value(&scalar.value))),

            Expr::Variable(ident) => {
                if self.param.as_deref() == Some(ident.name.as_str()) {
                    return Ok(Code::Subject);
                }
                self.env
                    .constant(&ident.name)
                    .cloned()
                    .map(Code::Literal)
                    .ok_or_else(|| TranslateError::UndefinedVariable {
                        name: ident.name.clone(),
                        position: ident.token.position,
                    })
            }

            Expr::Binary { op, left, right } => {
                let left = self.translate(left, ctx)?;
                let right = self.translate(right, ctx)?;
                Ok(Code::binary(*op, left, right))
            }

            Expr::Unary { op, operand } => {
                let inner = self.translate(operand, ctx)?;
                Ok(match op {
                    UnaryOp::Not => Code::Not(Box::new(inner)),
                    UnaryOp::Increment => Code::Step {
                        operand: Box::new(inner),
                        delta: 1,
                    },
                    UnaryOp::Decrement => Code::Step {
                        operand: Box::new(inner),
                        delta: -1,
                    },
                })
            }

            Expr::Compare { op, operand } => self.translate_compare(*op, operand),

            Expr::Range { lower, upper } => self.translate_range(lower, upper, ctx),

            Expr::Arrow(stages) => {
                let name = ctx.scope.next("arrow");
                let mark = ctx.codes.len();

                let mut codes = Vec::with_capacity(stages.len());
                for stage in stages {
                    if stage.body.contains_arrow() {
                        return Err(TranslateError::NestedArrow {
                            position: stage.token.position,
                        });
                    }
                    codes.push(self.translate(&stage.body, ctx)?);
                }

                let owned = ctx.names_since(mark);
                Ok(ctx.emit(
                    name,
                    FragmentBody::Arrow(ArrowPlan {
                        stages: codes,
                        owned,
                    }),
                ))
            }

            Expr::Call(call) => self.translate_call(call, ctx),

            Expr::Chain(calls) => self.translate_chain(calls, ctx),

            Expr::Lambda { params, body } => self.translate_lambda(params, body, ctx),
        }
    }

    /// Translates an argument that must behave as a condition on the value
    /// under test.
    pub(crate) fn translate_condition(
        &mut self,
        call: &Call,
        expr: &Expr,
        ctx: &mut TranslationContext,
    ) -> Result<Code, TranslateError> {
        if !is_condition(expr) {
            return Err(TranslateError::argument(
                call,
                format!("expected a condition, got '{}'", expr),
            ));
        }
        self.translate(expr, ctx)
    }

    fn translate_lambda(
        &mut self,
        params: &[Ident],
        body: &Expr,
        ctx: &mut TranslationContext,
    ) -> Result<Code, TranslateError> {
        let [param] = params else {
            return Err(TranslateError::NotConstant {
                message: format!(
                    "Anonymous functions take exactly one parameter, got {}",
                    params.len()
                ),
                position: params
                    .get(1)
                    .map(|p| p.token.position)
                    .unwrap_or_else(|| body.position()),
            });
        };

        let outer = self.param.replace(param.name.clone());
        let result = self.translate(body, ctx);
        self.param = outer;
        result
    }

    fn translate_compare(&mut self, op: CompareOp, operand: &Expr) -> Result<Code, TranslateError> {
        let position = operand.position();
        let value = match operand {
            Expr::Scalar(scalar) => literal_value(&scalar.value),
            Expr::Variable(ident) => {
                if self.param.as_deref() == Some(ident.name.as_str()) {
                    return Err(TranslateError::InvalidCompare {
                        message: "Comparison expression parameter cannot be the value under test"
                            .to_string(),
                        position,
                    });
                }
                self.env.constant(&ident.name).cloned().ok_or_else(|| {
                    TranslateError::UndefinedVariable {
                        name: ident.name.clone(),
                        position,
                    }
                })?
            }
            _ => {
                return Err(TranslateError::InvalidCompare {
                    message: "Comparison expression parameter cannot be an expression".to_string(),
                    position,
                });
            }
        };

        // Literals must be written as numbers; constants may hold numeric text.
        let numeric = match operand {
            Expr::Scalar(_) => value.is_numeric(),
            _ => value.to_number().is_some(),
        };
        if !op.is_equality() && !numeric {
            return Err(TranslateError::InvalidCompare {
                message: format!("'{}' cannot be followed by non-numeric type", op),
                position,
            });
        }

        Ok(Code::compare(op, Code::Literal(value)))
    }

    fn translate_range(
        &mut self,
        lower: &Bound,
        upper: &Bound,
        ctx: &mut TranslationContext,
    ) -> Result<Code, TranslateError> {
        let lt = infer(&lower.expr, self.env)?;
        let ut = infer(&upper.expr, self.env)?;
        if !lt.is_numeric() || lt != ut {
            return Err(TypeInferError::Mismatch {
                op: format!("{}{}", lower.bracket.text, upper.bracket.text),
                message: format!("range bounds must share one numeric type (got {} and {})", lt, ut),
                position: lower.bracket.position,
            }
            .into());
        }

        let low = self.bound_value(&lower.expr, ctx)?;
        let high = self.bound_value(&upper.expr, ctx)?;
        Ok(Code::binary(
            BinOp::And,
            Code::compare(lower.lower_op(), low),
            Code::compare(upper.upper_op(), high),
        ))
    }

    /// Bound expressions are arithmetic over constants and fold to a literal.
    fn bound_value(&mut self, expr: &Expr, ctx: &mut TranslationContext) -> Result<Code, TranslateError> {
        let code = self.translate(expr, ctx)?;
        Ok(fold(&code).map(Code::Literal).unwrap_or(code))
    }

    fn translate_call(&mut self, call: &Call, ctx: &mut TranslationContext) -> Result<Code, TranslateError> {
        if call.strict && call.name != "count" {
            return Err(TranslateError::argument(
                call,
                "the strict marker '!' is only supported by count",
            ));
        }

        if FUNCTIONS.contains(&call.name.as_str()) {
            return self.translate_function(call, ctx);
        }

        if self.udfs.is_kind(&call.name, UdfKind::Filter) {
            if !call.args.is_empty() {
                return Err(TranslateError::argument(call, "filter UDFs take no arguments"));
            }
            return Ok(Code::FilterUdf(call.name.clone()));
        }

        if chain::is_chain_operator(&call.name, self.udfs) {
            // A lone chain operator is a one-element pipeline; chain
            // validation reports what is missing.
            return self.translate_chain(std::slice::from_ref(call), ctx);
        }

        Err(TranslateError::UnknownFunction {
            name: call.name.clone(),
            position: call.position(),
        })
    }

    /// Folds a preamble expression to a value.
    pub fn constant(&mut self, expr: &Expr) -> Result<Value, TranslateError> {
        if !is_constant_expr(expr) {
            return Err(TranslateError::NotConstant {
                message: format!("'{}' is not a compile-time constant", expr),
                position: expr.position(),
            });
        }
        let mut scratch = TranslationContext::new();
        let code = self.translate(expr, &mut scratch)?;
        fold(&code).ok_or_else(|| TranslateError::NotConstant {
            message: format!("'{}' cannot be evaluated at compile time", expr),
            position: expr.position(),
        })
    }

    pub(crate) fn udf_error(&self, error: UdfError, call: &Call) -> TranslateError {
        TranslateError::Udf {
            error,
            position: call.position(),
        }
    }
}

/// Value of a literal node. Durations become integer milliseconds.
pub fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Integer(n) => Value::Integer(*n),
        Literal::Float(n) => Value::Float(*n),
        Literal::Str(s) => Value::String(s.clone()),
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::Duration(ms) => Value::Integer(*ms),
    }
}

fn is_constant_expr(expr: &Expr) -> bool {
    match expr {
        Expr::Scalar(_) | Expr::Variable(_) => true,
        Expr::Binary { left, right, .. } => is_constant_expr(left) && is_constant_expr(right),
        Expr::Unary { operand, .. } => is_constant_expr(operand),
        _ => false,
    }
}

/// Expressions that produce a truth value about the value under test.
fn is_condition(expr: &Expr) -> bool {
    match expr {
        Expr::Compare { .. }
        | Expr::Range { .. }
        | Expr::Lambda { .. }
        | Expr::Call(_)
        | Expr::Chain(_)
        | Expr::Arrow(_) => true,
        Expr::Scalar(scalar) => matches!(scalar.value, Literal::Boolean(_)),
        Expr::Binary { op, .. } => op.is_logical() || op.is_comparison(),
        Expr::Unary { op, .. } => *op == UnaryOp::Not,
        Expr::Variable(_) => false,
    }
}
