use crate::{
    ast::{Call, Expr},
    udf::{UdfKind, UdfRegistry},
};

use super::{
    Calculator, ChainPlan, Code, FilterStep, FragmentBody, Meet, Sampler, TranslateError,
    TranslationContext, Translator,
};

const OPERATORS: [&str; 14] = [
    "filter", "collect", "limit", "window", "take", "sum", "avg", "min", "max", "stddev", "count",
    "hitRate", "meet", "clear",
];

/// Whether `name` can appear as a chain element.
pub(super) fn is_chain_operator(name: &str, udfs: &UdfRegistry) -> bool {
    OPERATORS.contains(&name) || udfs.kind_of(name).is_some()
}

/// Position of an element in the pipeline grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Filter,
    Collect,
    Sample,
    Take,
    Calc,
    Meet,
    Clear,
}

impl Phase {
    fn accepts(self, next: Phase) -> bool {
        use Phase::*;
        match self {
            Start => matches!(next, Filter | Collect),
            Filter => matches!(next, Filter | Collect | Sample | Take | Calc),
            Collect => matches!(next, Sample | Take | Calc),
            Sample => matches!(next, Take | Calc),
            Take => matches!(next, Calc),
            Calc => matches!(next, Meet),
            Meet => matches!(next, Clear),
            Clear => false,
        }
    }
}

/// One classified chain element with its translated arguments.
enum Step {
    Filter(Option<FilterStep>),
    Collect,
    Sample(Sampler),
    Take(i64, Option<i64>),
    Calc(Calculator),
    Meet(Meet),
    Clear,
}

impl Step {
    fn phase(&self) -> Phase {
        match self {
            Step::Filter(_) => Phase::Filter,
            Step::Collect => Phase::Collect,
            Step::Sample(_) => Phase::Sample,
            Step::Take(..) => Phase::Take,
            Step::Calc(_) => Phase::Calc,
            Step::Meet(_) => Phase::Meet,
            Step::Clear => Phase::Clear,
        }
    }
}

impl Translator<'_> {
    pub(super) fn translate_chain(
        &mut self,
        calls: &[Call],
        ctx: &mut TranslationContext,
    ) -> Result<Code, TranslateError> {
        let name = ctx.scope.next("chain");
        let outer = ctx.pending_chain.replace(name.clone());
        let plan = self.chain_plan(calls, ctx);
        ctx.pending_chain = outer;
        Ok(ctx.emit(name, FragmentBody::Chain(plan?)))
    }

    fn chain_plan(
        &mut self,
        calls: &[Call],
        ctx: &mut TranslationContext,
    ) -> Result<ChainPlan, TranslateError> {
        let mut phase = Phase::Start;
        let mut previous: Option<&Call> = None;

        let mut filters = Vec::new();
        let mut sampler: Option<Sampler> = None;
        let mut take = None;
        let mut calc = None;
        let mut meet = None;
        let mut clear = false;

        for call in calls {
            let step = self.chain_step(call, ctx)?;
            let next = step.phase();

            if phase == Phase::Start && !Phase::Start.accepts(next) {
                log::warn!(
                    "{}: pipeline starts with '{}', inserting filter()",
                    ctx.pending_chain.as_deref().unwrap_or("chain"),
                    call.name
                );
                phase = Phase::Filter;
            }

            if let (Step::Sample(_), Some(existing)) = (&step, sampler) {
                let existing = match existing {
                    Sampler::Limit(_) => "limit",
                    Sampler::Window(_) => "window",
                };
                return Err(TranslateError::InvalidChain {
                    message: format!("'{}' cannot be combined with '{}'", call.name, existing),
                    position: call.position(),
                });
            }

            if !phase.accepts(next) {
                let message = match previous {
                    Some(prev) => format!(
                        "'{}' operator cannot be followed by '{}' operator",
                        prev.name, call.name
                    ),
                    None => format!("'{}' cannot start a chain", call.name),
                };
                return Err(TranslateError::InvalidChain {
                    message,
                    position: call.position(),
                });
            }

            match step {
                Step::Filter(Some(f)) => filters.push(f),
                Step::Filter(None) | Step::Collect => {}
                Step::Sample(s) => sampler = Some(s),
                Step::Take(start, end) => take = Some((start, end)),
                Step::Calc(c) => calc = Some(c),
                Step::Meet(m) => meet = Some(m),
                Step::Clear => clear = true,
            }
            phase = next;
            previous = Some(call);
        }

        let (Some(calc), Some(meet)) = (calc, meet) else {
            let at = calls.last().map(Call::position).unwrap_or_default();
            return Err(TranslateError::InvalidChain {
                message: "chain expression must end with 'meet' (optionally followed by 'clear')"
                    .to_string(),
                position: at,
            });
        };

        Ok(ChainPlan {
            filters,
            sampler,
            take,
            calc,
            meet,
            clear,
        })
    }

    fn chain_step(&mut self, call: &Call, ctx: &mut TranslationContext) -> Result<Step, TranslateError> {
        if call.strict {
            return Err(TranslateError::argument(
                call,
                "the strict marker '!' is only supported by count",
            ));
        }

        let step = match call.name.as_str() {
            "filter" => match call.args.as_slice() {
                [] => Step::Filter(None),
                [Expr::Call(inner)]
                    if inner.args.is_empty() && self.udfs.is_kind(&inner.name, UdfKind::Filter) =>
                {
                    Step::Filter(Some(FilterStep::Udf(inner.name.clone())))
                }
                [cond] => Step::Filter(Some(FilterStep::Cond(
                    self.translate_condition(call, cond, ctx)?,
                ))),
                _ => return Err(arity(call, "at most one condition")),
            },
            "collect" => {
                no_args(call)?;
                Step::Collect
            }
            "limit" => Step::Sample(Sampler::Limit(self.span_arg(call)?)),
            "window" => Step::Sample(Sampler::Window(self.span_arg(call)?)),
            "take" => match call.args.as_slice() {
                [start] => Step::Take(self.integer_arg(call, start)?, None),
                [start, end] => Step::Take(
                    self.integer_arg(call, start)?,
                    Some(self.integer_arg(call, end)?),
                ),
                _ => return Err(arity(call, "one or two indices")),
            },
            "sum" => calculator(call, Calculator::Sum)?,
            "avg" => calculator(call, Calculator::Avg)?,
            "min" => calculator(call, Calculator::Min)?,
            "max" => calculator(call, Calculator::Max)?,
            "stddev" => calculator(call, Calculator::Stddev)?,
            "count" => calculator(call, Calculator::Count)?,
            "hitRate" => match call.args.as_slice() {
                [cond] => Step::Calc(Calculator::HitRate(
                    self.translate_condition(call, cond, ctx)?,
                )),
                _ => return Err(arity(call, "exactly one condition")),
            },
            "meet" => match call.args.as_slice() {
                [cond] => Step::Meet(Meet::Cond(self.translate_condition(call, cond, ctx)?)),
                _ => return Err(arity(call, "exactly one condition")),
            },
            "clear" => {
                no_args(call)?;
                Step::Clear
            }
            name => {
                let step = match self.udfs.kind_of(name) {
                    Some(UdfKind::Filter) => Step::Filter(Some(FilterStep::Udf(name.to_string()))),
                    Some(UdfKind::Calculator) => Step::Calc(Calculator::Udf(name.to_string())),
                    Some(UdfKind::Meet) => Step::Meet(Meet::Udf(name.to_string())),
                    None => {
                        return Err(TranslateError::UnknownOperator {
                            name: name.to_string(),
                            position: call.position(),
                        });
                    }
                };
                no_args(call)?;
                step
            }
        };
        Ok(step)
    }
}

fn calculator(call: &Call, calc: Calculator) -> Result<Step, TranslateError> {
    no_args(call)?;
    Ok(Step::Calc(calc))
}

fn no_args(call: &Call) -> Result<(), TranslateError> {
    if call.args.is_empty() {
        Ok(())
    } else {
        Err(arity(call, "no arguments"))
    }
}

fn arity(call: &Call, expected: &str) -> TranslateError {
    TranslateError::argument(
        call,
        format!("expected {}, got {} argument(s)", expected, call.args.len()),
    )
}
