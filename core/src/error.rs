use thiserror::Error;

use crate::models::WorkflowState;

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// One incomplete required checklist item, as reported by
/// [`WorkflowError::StateChecklistIncomplete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteChecklistItem {
    pub id: String,
    pub title: String,
    pub description: String,
}

/// All failure modes of the workflow engine. Variants map 1:1 onto the
/// error kinds of spec §7.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    /// Goal length, priority enum, missing required field, and the like.
    #[error("validation error: {0}")]
    Validation(String),

    /// A task id (or pattern/checklist item id) could not be found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Attempted state jump is not the current state's successor.
    #[error(
        "invalid transition from {from} to {to}; valid next state is {}",
        valid_next.map(|s| s.as_str()).unwrap_or("none — this is the terminal state")
    )]
    InvalidTransition {
        from: WorkflowState,
        to: WorkflowState,
        valid_next: Option<WorkflowState>,
    },

    /// `transitionTo` blocked because required checklist items remain
    /// incomplete in the current state.
    #[error("{} required checklist item(s) incomplete for {state}", incomplete_items.len())]
    StateChecklistIncomplete {
        state: WorkflowState,
        incomplete_items: Vec<IncompleteChecklistItem>,
    },

    /// The task's workflow history failed validation: a corrupted or
    /// tampered-with `current-task.json`/`tasks.json`.
    #[error("history corruption detected: {0}")]
    HistoryCorruption(String),

    /// The file lock could not be acquired within its timeout.
    #[error("timed out waiting for lock on {path}")]
    LockTimeout { path: String },

    /// A transient IO failure that has already exhausted its retries.
    #[error("io error: {0}")]
    Io(String),

    /// The active task is not in `READY_TO_COMMIT` (completion attempted
    /// too early) or is not `id` (completion/transition attempted on a
    /// non-active task).
    #[error("task is not active: {0}")]
    NotActive(String),
}

impl WorkflowError {
    pub fn not_found_task(id: &str) -> Self {
        WorkflowError::NotFound(format!("task '{id}' not found"))
    }

    pub fn empty_field(field: &str) -> Self {
        WorkflowError::Validation(format!("field '{field}' cannot be empty"))
    }

    pub fn invalid_transition(from: WorkflowState, to: WorkflowState, valid_next: Option<WorkflowState>) -> Self {
        WorkflowError::InvalidTransition { from, to, valid_next }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WorkflowError::NotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, WorkflowError::Validation(_))
    }

    /// Whether this error should be retried with linear backoff (spec §7's
    /// "IO (transient)" category). Classification is by `ErrorKind` at the
    /// call site; this just marks the resulting error kind as retryable.
    pub fn is_io(&self) -> bool {
        matches!(self, WorkflowError::Io(_))
    }

    /// Exit code the CLI should surface for this error, per spec §6/§7.
    pub fn exit_code(&self) -> i32 {
        match self {
            WorkflowError::Validation(_) => 1,
            WorkflowError::NotFound(_) => 1,
            WorkflowError::InvalidTransition { .. } => 1,
            WorkflowError::StateChecklistIncomplete { .. } => 1,
            WorkflowError::HistoryCorruption(_) => 1,
            WorkflowError::LockTimeout { .. } => 1,
            WorkflowError::Io(_) => 1,
            WorkflowError::NotActive(_) => 1,
        }
    }
}

impl From<std::io::Error> for WorkflowError {
    fn from(err: std::io::Error) -> Self {
        WorkflowError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        WorkflowError::Io(format!("malformed json: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_predicates() {
        assert!(WorkflowError::not_found_task("task-1").is_not_found());
        assert!(!WorkflowError::not_found_task("task-1").is_validation());
        assert!(WorkflowError::empty_field("goal").is_validation());
    }

    #[test]
    fn invalid_transition_display() {
        let err = WorkflowError::invalid_transition(
            WorkflowState::Understanding,
            WorkflowState::Implementing,
            Some(WorkflowState::Designing),
        );
        let msg = err.to_string();
        assert!(msg.contains("UNDERSTANDING"));
        assert!(msg.contains("IMPLEMENTING"));
        assert!(msg.contains("DESIGNING"));
    }

    #[test]
    fn exit_codes_are_nonzero_failures() {
        assert_eq!(WorkflowError::Validation("x".into()).exit_code(), 1);
        assert_eq!(
            WorkflowError::LockTimeout { path: "x".into() }.exit_code(),
            1
        );
    }
}
