use crate::{
    ast::{Call, Expr, Literal},
    value::Value,
};

use super::{
    Code, FragmentBody, FunctionPlan, Span, TranslateError, TranslationContext, Translator,
};

/// Unit `slope` divides by when none is given.
const DEFAULT_SLOPE_UNIT_MS: i64 = 1;

/// Literal argument after constant resolution.
enum ArgValue {
    Integer(i64),
    Duration(i64),
    Other(Value),
}

impl Translator<'_> {
    /// `count`, `keep`, `delay` and `slope`.
    pub(super) fn translate_function(
        &mut self,
        call: &Call,
        ctx: &mut TranslationContext,
    ) -> Result<Code, TranslateError> {
        let name = ctx.scope.next(&call.name);

        let plan = match (call.name.as_str(), call.args.as_slice()) {
            ("count", [cond, times]) => FunctionPlan::Count {
                cond: self.translate_condition(call, cond, ctx)?,
                times: self.positive_count(call, times)? as u64,
                strict: call.strict,
            },
            ("keep", [cond, duration]) => FunctionPlan::Keep {
                cond: self.translate_condition(call, cond, ctx)?,
                duration_ms: self.duration_arg(call, duration)?,
            },
            ("delay", [duration]) => FunctionPlan::Delay {
                duration_ms: self.duration_arg(call, duration)?,
            },
            ("slope", [cond]) => FunctionPlan::Slope {
                cond: self.translate_condition(call, cond, ctx)?,
                unit_ms: DEFAULT_SLOPE_UNIT_MS,
            },
            ("slope", [cond, unit]) => FunctionPlan::Slope {
                cond: self.translate_condition(call, cond, ctx)?,
                unit_ms: self.duration_arg(call, unit)?,
            },
            ("count", _) => return Err(arity(call, "(condition, times)")),
            ("keep", _) => return Err(arity(call, "(condition, duration)")),
            ("delay", _) => return Err(arity(call, "(duration)")),
            ("slope", _) => return Err(arity(call, "(condition[, unit])")),
            _ => {
                return Err(TranslateError::UnknownFunction {
                    name: call.name.clone(),
                    position: call.position(),
                });
            }
        };

        Ok(ctx.emit(name, FragmentBody::Function(plan)))
    }

    fn arg_value(&self, call: &Call, expr: &Expr) -> Result<ArgValue, TranslateError> {
        match expr {
            Expr::Scalar(scalar) => Ok(match &scalar.value {
                Literal::Integer(n) => ArgValue::Integer(*n),
                Literal::Duration(ms) => ArgValue::Duration(*ms),
                other => ArgValue::Other(super::literal_value(other)),
            }),
            Expr::Variable(ident) => match self.env.constant(&ident.name) {
                Some(Value::Integer(n)) => Ok(ArgValue::Integer(*n)),
                Some(other) => Ok(ArgValue::Other(other.clone())),
                None => Err(TranslateError::UndefinedVariable {
                    name: ident.name.clone(),
                    position: ident.token.position,
                }),
            },
            _ => Err(TranslateError::argument(
                call,
                format!("'{}' must be a literal or a constant", expr),
            )),
        }
    }

    /// Any integer, negative included (`take` indices).
    pub(super) fn integer_arg(&self, call: &Call, expr: &Expr) -> Result<i64, TranslateError> {
        match self.arg_value(call, expr)? {
            ArgValue::Integer(n) => Ok(n),
            _ => Err(TranslateError::argument(
                call,
                format!("expected an integer, got '{}'", expr),
            )),
        }
    }

    pub(super) fn positive_count(&self, call: &Call, expr: &Expr) -> Result<usize, TranslateError> {
        match self.arg_value(call, expr)? {
            ArgValue::Integer(n) if n > 0 => Ok(n as usize),
            ArgValue::Integer(n) => Err(TranslateError::argument(
                call,
                format!("count must be positive, got {}", n),
            )),
            _ => Err(TranslateError::argument(
                call,
                format!("expected a positive integer, got '{}'", expr),
            )),
        }
    }

    /// A duration literal; a bare integer counts as milliseconds.
    pub(super) fn duration_arg(&self, call: &Call, expr: &Expr) -> Result<i64, TranslateError> {
        match self.arg_value(call, expr)? {
            ArgValue::Duration(ms) | ArgValue::Integer(ms) if ms > 0 => Ok(ms),
            ArgValue::Duration(ms) | ArgValue::Integer(ms) => Err(TranslateError::argument(
                call,
                format!("duration must be positive, got {}ms", ms),
            )),
            ArgValue::Other(_) => Err(TranslateError::argument(
                call,
                format!("expected a duration, got '{}'", expr),
            )),
        }
    }

    /// `limit`/`window` size: a positive count or a positive duration.
    pub(super) fn span_arg(&self, call: &Call) -> Result<Span, TranslateError> {
        let [arg] = call.args.as_slice() else {
            return Err(arity(call, "(count) or (duration)"));
        };
        match self.arg_value(call, arg)? {
            ArgValue::Integer(n) if n > 0 => Ok(Span::Count(n as usize)),
            ArgValue::Duration(ms) if ms > 0 => Ok(Span::Duration(ms)),
            ArgValue::Integer(_) | ArgValue::Duration(_) => Err(TranslateError::argument(
                call,
                format!("'{}' must be greater than zero", arg),
            )),
            ArgValue::Other(_) => Err(TranslateError::argument(
                call,
                format!("expected a count or a duration, got '{}'", arg),
            )),
        }
    }
}

fn arity(call: &Call, signature: &str) -> TranslateError {
    TranslateError::argument(
        call,
        format!(
            "expected {}{}, got {} argument(s)",
            call.name,
            signature,
            call.args.len()
        ),
    )
}
