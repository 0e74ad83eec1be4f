use crate::translator::ArrowPlan;

use super::{Environment, Frame, RuntimeError, eval};

/// Progress of one arrow sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArrowState {
    /// Index of the stage the next event is tested against
    pub pointer: usize,
    /// Timestamp of the event that satisfied the previous stage
    pub last_advance: Option<i64>,
}

/// A failing stage holds its position. Completing the last stage reports
/// true, rewinds to the first stage and wipes the state of every fragment
/// nested in the stages.
pub(super) fn run(
    plan: &ArrowPlan,
    state: &mut ArrowState,
    frame: &Frame<'_>,
    env: &mut Environment,
) -> Result<bool, RuntimeError> {
    let Some(stage) = plan.stages.get(state.pointer) else {
        *state = ArrowState::default();
        return Ok(false);
    };

    let anchor = if state.pointer > 0 {
        state.last_advance
    } else {
        None
    };
    let stage_frame = frame.with_anchor(anchor);
    if !eval(stage, &frame.event.value, &stage_frame, env)?.as_bool() {
        return Ok(false);
    }

    state.pointer += 1;
    state.last_advance = Some(frame.event.timestamp);
    if state.pointer < plan.stages.len() {
        return Ok(false);
    }

    *state = ArrowState::default();
    for name in &plan.owned {
        env.reset_state(name);
    }
    Ok(true)
}
