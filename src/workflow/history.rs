//! Derives rollback targets by replaying a workflow's transition log.
//!
//! The log is treated as a stack of visited states: forward moves push,
//! rollbacks pop back to their target, pause/resume leave it untouched.

use super::stages::{stage_config, StageKind};
use super::types::{Transition, TransitionType, WorkflowState};

/// States the workflow currently stands on, oldest first
pub fn visited_stack(transitions: &[Transition]) -> Vec<WorkflowState> {
    let mut stack: Vec<WorkflowState> = Vec::new();

    for transition in transitions {
        match transition.transition_type {
            TransitionType::Created | TransitionType::Advance | TransitionType::HumanReview => {
                let to = transition.to_state;
                if !to.is_terminal() && stack.last() != Some(&to) {
                    stack.push(to);
                }
            }
            TransitionType::Rollback => {
                let to = transition.to_state;
                while let Some(top) = stack.last() {
                    if *top == to {
                        break;
                    }
                    stack.pop();
                }
                if stack.is_empty() {
                    stack.push(to);
                }
            }
            TransitionType::Pause | TransitionType::Resume | TransitionType::Cancel => {}
        }
    }

    stack
}

/// The state visited immediately before the current one
pub fn rollback_target(transitions: &[Transition]) -> Option<WorkflowState> {
    let stack = visited_stack(transitions);
    if stack.len() < 2 {
        return None;
    }
    stack.get(stack.len() - 2).copied()
}

/// The state a workflow was just rolled back from, when it had reached that
/// state straight from `stage`. Retries and pause/resume in between keep it.
pub fn rolled_back_from(transitions: &[Transition], stage: WorkflowState) -> Option<WorkflowState> {
    let index = transitions.iter().rposition(|transition| {
        !matches!(
            transition.transition_type,
            TransitionType::Pause | TransitionType::Resume
        )
    })?;
    let last = &transitions[index];
    if last.transition_type != TransitionType::Rollback || last.to_state != stage {
        return None;
    }

    let from = last.from_state?;
    match visited_stack(&transitions[..index]).as_slice() {
        [.., below, top] if *below == stage && *top == from => Some(from),
        _ => None,
    }
}

/// Where a revision request sends the workflow: the last visit to
/// CONTENT_GENERATION, or failing that the most recent producer stage.
pub fn revision_target(transitions: &[Transition]) -> Option<WorkflowState> {
    let stack = visited_stack(transitions);
    let (_, earlier) = stack.split_last()?;

    if earlier.contains(&WorkflowState::ContentGeneration) {
        return Some(WorkflowState::ContentGeneration);
    }

    earlier.iter().rev().copied().find(|state| {
        stage_config(*state)
            .map(|config| config.kind == StageKind::Producer)
            .unwrap_or(false)
    })
}

/// When the workflow last entered `state`
pub fn last_entered(
    transitions: &[Transition],
    state: WorkflowState,
) -> Option<chrono::DateTime<chrono::Utc>> {
    transitions
        .iter()
        .rev()
        .find(|transition| {
            transition.to_state == state && transition.transition_type != TransitionType::Resume
        })
        .map(|transition| transition.created_at)
}
