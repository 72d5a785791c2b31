//! Pure functions over [`WorkflowState`] ordering. No IO, no persistence —
//! everything that needs to know the shape of the six-phase sequence goes
//! through here rather than re-deriving it.

use crate::error::{Result, WorkflowError};
use crate::models::WorkflowState;

/// Position of `state` in the canonical sequence, `0..=5`.
pub fn index(state: WorkflowState) -> usize {
    WorkflowState::ALL
        .iter()
        .position(|s| *s == state)
        .expect("WorkflowState::ALL covers every variant")
}

/// The state that follows `state`, or `None` if `state` is terminal
/// (`READY_TO_COMMIT`).
pub fn next(state: WorkflowState) -> Option<WorkflowState> {
    let i = index(state);
    WorkflowState::ALL.get(i + 1).copied()
}

/// `true` only when `to` is exactly the successor of `from` — no skips, no
/// going backwards, no staying put.
pub fn is_valid_transition(from: WorkflowState, to: WorkflowState) -> bool {
    next(from) == Some(to)
}

/// Integer completion percentage for `state`, per spec §4.2:
/// `round(100 * index / (N - 1))`.
pub fn progress_percent(state: WorkflowState) -> u8 {
    let i = index(state) as f64;
    let last = (WorkflowState::ALL.len() - 1) as f64;
    (100.0 * i / last).round() as u8
}

/// Validate that `to` is a legal next state from `from`, producing the
/// exact [`WorkflowError::InvalidTransition`] the CLI surfaces on failure.
pub fn require_valid_transition(from: WorkflowState, to: WorkflowState) -> Result<()> {
    if is_valid_transition(from, to) {
        Ok(())
    } else {
        Err(WorkflowError::invalid_transition(from, to, next(from)))
    }
}

/// Replay a state history and confirm it forms a strictly increasing,
/// gap-free prefix of [`WorkflowState::ALL`] ending at `current`. Used to
/// detect tampering in `current-task.json`/`tasks.json` (spec §7,
/// `HistoryCorruption`).
pub fn validate_history(history: &[WorkflowState], current: WorkflowState) -> Result<()> {
    if history.is_empty() {
        return Err(WorkflowError::HistoryCorruption(
            "state history must contain at least the initial state".into(),
        ));
    }
    if history[0] != WorkflowState::Understanding {
        return Err(WorkflowError::HistoryCorruption(format!(
            "history must start at {}",
            WorkflowState::Understanding
        )));
    }
    for pair in history.windows(2) {
        if !is_valid_transition(pair[0], pair[1]) {
            return Err(WorkflowError::HistoryCorruption(format!(
                "illegal recorded transition from {} to {}",
                pair[0], pair[1]
            )));
        }
    }
    if *history.last().unwrap() != current {
        return Err(WorkflowError::HistoryCorruption(format!(
            "history ends at {} but current state is {}",
            history.last().unwrap(),
            current
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_sequence_only() {
        assert!(is_valid_transition(
            WorkflowState::Understanding,
            WorkflowState::Designing
        ));
        assert!(!is_valid_transition(
            WorkflowState::Understanding,
            WorkflowState::Implementing
        ));
        assert!(!is_valid_transition(
            WorkflowState::Designing,
            WorkflowState::Understanding
        ));
        assert!(!is_valid_transition(
            WorkflowState::Understanding,
            WorkflowState::Understanding
        ));
        assert_eq!(next(WorkflowState::ReadyToCommit), None);
    }

    #[test]
    fn progress_endpoints() {
        assert_eq!(progress_percent(WorkflowState::Understanding), 0);
        assert_eq!(progress_percent(WorkflowState::ReadyToCommit), 100);
        assert_eq!(progress_percent(WorkflowState::Implementing), 40);
    }

    #[test]
    fn history_validation_catches_gaps_and_regressions() {
        use WorkflowState::*;
        assert!(validate_history(&[Understanding, Designing], Designing).is_ok());
        assert!(validate_history(&[Understanding, Implementing], Implementing).is_err());
        assert!(validate_history(&[Designing], Designing).is_err());
        assert!(validate_history(&[Understanding, Designing], Implementing).is_err());
    }
}
