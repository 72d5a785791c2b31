//! Property-based checks of the pure state-sequence invariants in spec
//! §4.2/§8: every accepted transition moves exactly one index forward,
//! and any strictly-increasing, gap-free prefix of the six-state sequence
//! is a valid recorded history.

use proptest::prelude::*;
use workflow_core::models::WorkflowState;
use workflow_core::state_engine;

fn arb_state() -> impl Strategy<Value = WorkflowState> {
    (0usize..6).prop_map(|i| WorkflowState::ALL[i])
}

proptest! {
    #[test]
    fn accepted_transitions_always_move_exactly_one_index_forward(
        from in arb_state(),
        to in arb_state(),
    ) {
        if state_engine::is_valid_transition(from, to) {
            prop_assert_eq!(state_engine::index(to), state_engine::index(from) + 1);
        }
    }

    #[test]
    fn every_state_accepts_at_most_one_successor(from in arb_state()) {
        let successors: Vec<WorkflowState> = WorkflowState::ALL
            .into_iter()
            .filter(|to| state_engine::is_valid_transition(from, *to))
            .collect();
        prop_assert!(successors.len() <= 1);
    }

    #[test]
    fn any_prefix_length_of_the_canonical_sequence_is_a_valid_history(len in 1usize..=6) {
        let prefix: Vec<WorkflowState> = WorkflowState::ALL[..len].to_vec();
        let current = *prefix.last().unwrap();
        prop_assert!(state_engine::validate_history(&prefix, current).is_ok());
    }

    #[test]
    fn a_history_with_any_state_removed_from_the_middle_is_invalid(
        len in 3usize..=6,
        drop_at in 1usize..4,
    ) {
        prop_assume!(drop_at < len - 1);
        let mut prefix: Vec<WorkflowState> = WorkflowState::ALL[..len].to_vec();
        prefix.remove(drop_at);
        let current = *prefix.last().unwrap();
        prop_assert!(state_engine::validate_history(&prefix, current).is_err());
    }

    #[test]
    fn progress_percent_is_monotonic_with_index(a in arb_state(), b in arb_state()) {
        if state_engine::index(a) < state_engine::index(b) {
            prop_assert!(state_engine::progress_percent(a) <= state_engine::progress_percent(b));
        }
    }
}
