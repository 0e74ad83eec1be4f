use std::collections::VecDeque;

use crate::{
    translator::{ChainPlan, FilterStep, Meet, Sampler, Span},
    value::Event,
};

use super::{Environment, Frame, RuntimeError, aggregate, eval};

/// Values retained by one chain between calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainState {
    queue: VecDeque<Event>,
    emitted: Vec<Event>,
}

impl ChainState {
    pub fn retained(&self) -> impl Iterator<Item = &Event> {
        self.queue.iter()
    }

    /// Values the retention stage handed downstream on the latest call;
    /// empty when a window emitted nothing.
    pub fn emitted(&self) -> &[Event] {
        &self.emitted
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

pub(super) fn run(
    name: &str,
    plan: &ChainPlan,
    state: &mut ChainState,
    frame: &Frame<'_>,
    env: &mut Environment,
) -> Result<bool, RuntimeError> {
    if let Some((start, end)) = plan.take {
        check_take(name, start, end)?;
    }

    let admitted = admit(&plan.filters, frame, env)?;
    let Some(batch) = retain(plan.sampler, state, frame.event, admitted) else {
        state.emitted.clear();
        return Ok(false);
    };
    state.emitted.clone_from(&batch);

    let batch = match plan.take {
        Some((start, end)) => match slice(&batch, start, end) {
            Some(taken) => taken,
            None => return Ok(false),
        },
        None => batch,
    };

    let aggregate = aggregate::calculate(&plan.calc, &batch, frame, env)?;
    let result = match &plan.meet {
        Meet::Cond(code) => eval(code, &aggregate, frame, env)?.as_bool(),
        Meet::Udf(udf) => frame
            .udfs
            .meet(udf)?
            .meet(aggregate.to_number().unwrap_or(0.0)),
    };
    log::trace!(
        "{}: {} value(s), aggregate {} -> {}",
        name,
        batch.len(),
        aggregate,
        result
    );

    if result && plan.clear {
        state.queue.clear();
    }
    Ok(result)
}

fn admit(
    filters: &[FilterStep],
    frame: &Frame<'_>,
    env: &mut Environment,
) -> Result<bool, RuntimeError> {
    for step in filters {
        let passed = match step {
            FilterStep::Cond(code) => eval(code, &frame.event.value, frame, env)?.as_bool(),
            FilterStep::Udf(name) => frame.udfs.filter(name)?.filter(frame.event),
        };
        if !passed {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Applies the retention policy and returns the values handed downstream,
/// or `None` when nothing is emitted on this call.
fn retain(
    sampler: Option<Sampler>,
    state: &mut ChainState,
    event: &Event,
    admitted: bool,
) -> Option<Vec<Event>> {
    let queue = &mut state.queue;

    match sampler {
        None => {
            if admitted {
                queue.push_back(event.clone());
            }
            Some(queue.iter().cloned().collect())
        }

        Some(Sampler::Limit(Span::Count(n))) => {
            if admitted {
                queue.push_back(event.clone());
                while queue.len() > n {
                    queue.pop_front();
                }
            }
            Some(queue.iter().cloned().collect())
        }

        Some(Sampler::Limit(Span::Duration(ms))) => {
            if admitted {
                queue.push_back(event.clone());
                let oldest = event.timestamp.saturating_sub(ms);
                queue.retain(|e| e.timestamp >= oldest);
            }
            Some(queue.iter().cloned().collect())
        }

        Some(Sampler::Window(Span::Count(n))) => {
            if !admitted {
                return None;
            }
            queue.push_back(event.clone());
            if queue.len() < n {
                return None;
            }
            let group = queue.iter().take(n).cloned().collect();
            queue.pop_front();
            Some(group)
        }

        Some(Sampler::Window(Span::Duration(ms))) => {
            if !admitted {
                return None;
            }
            queue.push_back(event.clone());
            let head = queue.front()?.timestamp;
            if event.timestamp.saturating_sub(head) < ms {
                return None;
            }
            let end = head.saturating_add(ms);
            let group = queue
                .iter()
                .filter(|e| e.timestamp <= end)
                .cloned()
                .collect();
            queue.pop_front();
            Some(group)
        }
    }
}

/// Same-signed `start > end` can never select anything.
fn check_take(name: &str, start: i64, end: Option<i64>) -> Result<(), RuntimeError> {
    if let Some(end) = end
        && (start >= 0) == (end >= 0)
        && start > end
    {
        return Err(RuntimeError::InvalidArgument {
            fragment: name.to_string(),
            message: format!("take({},{}): start index is after end index", start, end),
        });
    }
    Ok(())
}

/// `values[start..end]` with negative indices counted from the back.
/// `None` when the current retention cannot satisfy the range.
fn slice(values: &[Event], start: i64, end: Option<i64>) -> Option<Vec<Event>> {
    let len = values.len() as i64;
    let normalize = |i: i64| if i < 0 { len + i } else { i };

    let s = normalize(start);
    let e = end.map(normalize).unwrap_or(len);
    if s < 0 || e > len || s > e {
        return None;
    }
    Some(values[s as usize..e as usize].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(values: &[i64]) -> Vec<Event> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Event::at(*v, i as i64))
            .collect()
    }

    fn values(events: &[Event]) -> Vec<i64> {
        events.iter().filter_map(|e| e.value.as_int()).collect()
    }

    #[test]
    fn test_slice_negative_indices() {
        let all = events(&[1, 2, 3, 4, 5]);
        assert_eq!(values(&slice(&all, -3, Some(-1)).unwrap()), vec![3, 4]);
        assert_eq!(values(&slice(&all, 2, None).unwrap()), vec![3, 4, 5]);
        assert_eq!(values(&slice(&all, 0, Some(-1)).unwrap()), vec![1, 2, 3, 4]);
        assert!(slice(&all, -3, Some(6)).is_none());
        assert!(slice(&events(&[1]), 0, Some(2)).is_none());
    }

    #[test]
    fn test_take_validation() {
        assert!(check_take("chain_1", 5, Some(3)).is_err());
        assert!(check_take("chain_1", -1, Some(-2)).is_err());
        assert!(check_take("chain_1", 0, Some(-1)).is_ok());
        assert!(check_take("chain_1", 3, None).is_ok());
    }

    #[test]
    fn test_count_window_slides() {
        let mut state = ChainState::default();
        let sampler = Some(Sampler::Window(Span::Count(2)));
        let all = events(&[0, 1, 2]);

        assert!(retain(sampler, &mut state, &all[0], true).is_none());
        assert_eq!(values(&retain(sampler, &mut state, &all[1], true).unwrap()), vec![0, 1]);
        assert_eq!(values(&retain(sampler, &mut state, &all[2], true).unwrap()), vec![1, 2]);
    }

    #[test]
    fn test_time_limit_drops_old_values() {
        let mut state = ChainState::default();
        let sampler = Some(Sampler::Limit(Span::Duration(500)));
        retain(sampler, &mut state, &Event::at(1, 0), true);
        retain(sampler, &mut state, &Event::at(2, 300), true);
        let kept = retain(sampler, &mut state, &Event::at(3, 700), true).unwrap();
        assert_eq!(values(&kept), vec![2, 3]);
    }
}
