use crate::{translator::FunctionPlan, value::Value};

use super::{Environment, Frame, RuntimeError, eval};

/// Memory of the stateful functions usable outside chains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FunctionState {
    /// Matches seen since the last firing
    Count(u64),
    /// Timestamp the condition started holding
    Keep(Option<i64>),
    /// Timestamp the wait started, when not anchored by an arrow
    Delay(Option<i64>),
    /// Previous reading and its timestamp
    Slope(Option<(f64, i64)>),
}

impl FunctionState {
    pub fn initial(plan: &FunctionPlan) -> Self {
        match plan {
            FunctionPlan::Count { .. } => FunctionState::Count(0),
            FunctionPlan::Keep { .. } => FunctionState::Keep(None),
            FunctionPlan::Delay { .. } => FunctionState::Delay(None),
            FunctionPlan::Slope { .. } => FunctionState::Slope(None),
        }
    }
}

pub(super) fn run(
    plan: &FunctionPlan,
    state: &mut FunctionState,
    frame: &Frame<'_>,
    env: &mut Environment,
) -> Result<bool, RuntimeError> {
    let event = frame.event;

    match (plan, state) {
        (
            FunctionPlan::Count {
                cond,
                times,
                strict,
            },
            FunctionState::Count(seen),
        ) => {
            if !eval(cond, &event.value, frame, env)?.as_bool() {
                if *strict {
                    *seen = 0;
                }
                return Ok(false);
            }
            *seen += 1;
            if *seen >= *times {
                *seen = 0;
                return Ok(true);
            }
            Ok(false)
        }

        (FunctionPlan::Keep { cond, duration_ms }, FunctionState::Keep(start)) => {
            if !eval(cond, &event.value, frame, env)?.as_bool() {
                *start = None;
                return Ok(false);
            }
            let since = *start.get_or_insert(event.timestamp);
            if event.timestamp.saturating_sub(since) >= *duration_ms {
                *start = None;
                return Ok(true);
            }
            Ok(false)
        }

        (FunctionPlan::Delay { duration_ms }, FunctionState::Delay(start)) => {
            let since = match frame.anchor {
                Some(anchor) => anchor,
                None => *start.get_or_insert(event.timestamp),
            };
            if event.timestamp.saturating_sub(since) >= *duration_ms {
                *start = None;
                return Ok(true);
            }
            Ok(false)
        }

        (FunctionPlan::Slope { cond, unit_ms }, FunctionState::Slope(previous)) => {
            let Some(current) = event.value.to_number() else {
                return Ok(false);
            };
            let last = previous.replace((current, event.timestamp));

            let Some((value, at)) = last else {
                return Ok(false);
            };
            let elapsed = event.timestamp.saturating_sub(at);
            if elapsed == 0 {
                return Ok(false);
            }
            let slope = (current - value) / (elapsed as f64 / *unit_ms as f64);
            Ok(eval(cond, &Value::Float(slope), frame, env)?.as_bool())
        }

        (plan, state) => {
            *state = FunctionState::initial(plan);
            run(plan, state, frame, env)
        }
    }
}
