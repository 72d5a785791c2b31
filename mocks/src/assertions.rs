//! Custom assertion helpers for testing.
//!
//! Specialized assertions for task equality, workflow state, and
//! queue-ordering checks, mirroring the teacher's assertion module.

use workflow_core::models::{Priority, Task, TaskStatus, WorkflowState};
use workflow_core::state_engine;

/// Assert tasks are equal ignoring timestamps.
pub fn assert_task_equals(actual: &Task, expected: &Task) {
    assert_eq!(actual.id, expected.id, "task ids don't match");
    assert_eq!(actual.goal, expected.goal, "task goals don't match");
    assert_eq!(actual.status, expected.status, "task statuses don't match");
    assert_eq!(actual.priority, expected.priority, "task priorities don't match");
    assert_eq!(actual.tags, expected.tags, "task tags don't match");
}

/// Assert tasks are equal including exact timestamps.
pub fn assert_task_equals_exact(actual: &Task, expected: &Task) {
    assert_eq!(actual, expected, "tasks are not exactly equal");
}

/// Assert `from -> to` is a legal workflow transition.
pub fn assert_state_transition_valid(from: WorkflowState, to: WorkflowState) {
    assert!(
        state_engine::is_valid_transition(from, to),
        "expected transition from {from} to {to} to be valid, but it's not"
    );
}

/// Assert `from -> to` is not a legal workflow transition.
pub fn assert_state_transition_invalid(from: WorkflowState, to: WorkflowState) {
    assert!(
        !state_engine::is_valid_transition(from, to),
        "expected transition from {from} to {to} to be invalid, but it's valid"
    );
}

/// Assert `tasks` contains one with the given id.
pub fn assert_contains_task_with_id(tasks: &[Task], id: &str) {
    assert!(
        tasks.iter().any(|t| t.id == id),
        "expected to find task with id '{id}' in task list, but it wasn't found. Available ids: {:?}",
        tasks.iter().map(|t| &t.id).collect::<Vec<_>>()
    );
}

/// Assert `tasks` are sorted by queue order: priority descending, then
/// creation time ascending (spec §4.3).
pub fn assert_queued_sorted_by_priority(tasks: &[Task]) {
    for window in tasks.windows(2) {
        let (a, b) = (&window[0], &window[1]);
        assert!(
            a.priority > b.priority || (a.priority == b.priority && a.created_at <= b.created_at),
            "tasks are not sorted by priority then creation time: '{}' ({:?}) before '{}' ({:?})",
            a.id,
            a.priority,
            b.id,
            b.priority
        );
    }
}

/// Assert at most one task in `tasks` is `ACTIVE`.
pub fn assert_at_most_one_active(tasks: &[Task]) {
    let active_count = tasks.iter().filter(|t| t.status == TaskStatus::Active).count();
    assert!(
        active_count <= 1,
        "expected at most one active task, found {active_count}"
    );
}

/// Flexible task matcher for partial assertions.
#[derive(Debug, Default)]
pub struct TaskMatcher {
    pub id: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
}

impl TaskMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.id.as_ref().map(|id| *id == task.id).unwrap_or(true)
            && self.status.map(|s| s == task.status).unwrap_or(true)
            && self.priority.map(|p| p == task.priority).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_assertions_match_state_engine() {
        assert_state_transition_valid(WorkflowState::Understanding, WorkflowState::Designing);
        assert_state_transition_invalid(WorkflowState::Understanding, WorkflowState::Testing);
    }
}
