//! Field- and cross-document-level validation, mirroring the teacher's
//! associated-function-per-rule style: each public fn validates exactly one
//! thing and returns a [`WorkflowError::Validation`] naming the field.

use chrono::{DateTime, Utc};

use crate::error::{Result, WorkflowError};
use crate::models::{LegacyTask, Task, WorkflowState};
use crate::state_engine;

const GOAL_MIN_LEN: usize = 10;
const GOAL_MAX_LEN: usize = 500;

/// How long a cached `validate` run stays usable for `--use-cache` (spec §7).
const VALIDATION_CACHE_TTL_MINUTES: i64 = 30;

/// A cached outcome of running `ai-workflow validate`, so `--use-cache` can
/// skip re-running pattern verification and the review checklist's automated
/// command when nothing relevant has changed since.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationCache {
    pub timestamp: DateTime<Utc>,
    pub task_id: String,
    pub commit_hash: Option<String>,
    pub overall: bool,
    pub cursor_verified: bool,
}

impl ValidationCache {
    /// Fresh iff it is for the same active task and under 30 minutes old.
    /// A changed `commit_hash` (when both sides know one) also invalidates
    /// it, since the validated tree has since moved on.
    pub fn is_fresh_for(&self, task_id: &str, now: DateTime<Utc>, commit_hash: Option<&str>) -> bool {
        if self.task_id != task_id {
            return false;
        }
        if let (Some(cached), Some(current)) = (&self.commit_hash, commit_hash) {
            if cached != current {
                return false;
            }
        }
        now.signed_duration_since(self.timestamp).num_minutes() < VALIDATION_CACHE_TTL_MINUTES
    }
}

/// Outcome of [`Validator::validate_both`].
#[derive(Debug, Clone, PartialEq)]
pub struct CrossValidation {
    pub valid: bool,
    pub error: Option<String>,
    pub source: CrossValidationSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossValidationSource {
    Queue,
    File,
    Both,
}

pub struct Validator;

impl Validator {
    /// Trims `goal` and checks its length lies in `[10, 500]`.
    pub fn validate_goal(goal: &str) -> Result<String> {
        let trimmed = goal.trim().to_string();
        if trimmed.len() < GOAL_MIN_LEN || trimmed.len() > GOAL_MAX_LEN {
            return Err(WorkflowError::Validation(format!(
                "goal must be between {GOAL_MIN_LEN} and {GOAL_MAX_LEN} characters after trimming, got {}",
                trimmed.len()
            )));
        }
        Ok(trimmed)
    }

    /// Thin wrapper around [`state_engine::is_valid_transition`] that
    /// raises the exact error the lifecycle service and CLI propagate.
    pub fn validate_state_transition(current: WorkflowState, next: WorkflowState) -> Result<()> {
        state_engine::require_valid_transition(current, next)
    }

    /// As §4.2's history rule, plus explicit regression/skip detection so
    /// callers get a descriptive message rather than a generic mismatch.
    pub fn validate_state_history(task: &Task) -> Result<()> {
        let Some(workflow) = &task.workflow else {
            return Err(WorkflowError::HistoryCorruption(
                "task has no workflow to validate".into(),
            ));
        };
        if workflow.state_history.iter().any(|e| e.state == workflow.current_state) {
            return Err(WorkflowError::HistoryCorruption(format!(
                "Current state found in history: {} must not also appear in stateHistory",
                workflow.current_state
            )));
        }
        // An empty history is valid at any state per spec §4.2: a task may
        // have advanced through several states without its intermediate
        // entries ever being recorded.
        if workflow.state_history.is_empty() {
            return Ok(());
        }
        let mut full_sequence: Vec<WorkflowState> =
            workflow.state_history.iter().map(|e| e.state).collect();
        full_sequence.push(workflow.current_state);
        state_engine::validate_history(&full_sequence, workflow.current_state)
    }

    /// Cross-checks a queue [`Task`] against its [`LegacyTask`] mirror per
    /// invariant 5: matching id, goal, and current workflow state.
    pub fn validate_both(queue_task: &Task, file_task: &LegacyTask) -> CrossValidation {
        if queue_task.id != file_task.task_id {
            return CrossValidation {
                valid: false,
                error: Some(format!(
                    "id mismatch: queue='{}' file='{}'",
                    queue_task.id, file_task.task_id
                )),
                source: CrossValidationSource::Both,
            };
        }
        if queue_task.goal != file_task.original_goal {
            return CrossValidation {
                valid: false,
                error: Some("goal mismatch between queue and legacy file".into()),
                source: CrossValidationSource::Both,
            };
        }
        let queue_state = queue_task.workflow.as_ref().map(|w| w.current_state);
        let file_state = file_task.workflow.as_ref().map(|w| w.current_state);
        if queue_state != file_state {
            return CrossValidation {
                valid: false,
                error: Some(format!(
                    "workflow.currentState mismatch: queue={queue_state:?} file={file_state:?}"
                )),
                source: CrossValidationSource::Both,
            };
        }
        CrossValidation {
            valid: true,
            error: None,
            source: CrossValidationSource::Both,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn validation_cache_expires_after_thirty_minutes() {
        let now = Utc::now();
        let cache = ValidationCache {
            timestamp: now - Duration::minutes(31),
            task_id: "task-1".into(),
            commit_hash: Some("abc123".into()),
            overall: true,
            cursor_verified: true,
        };
        assert!(!cache.is_fresh_for("task-1", now, Some("abc123")));
    }

    #[test]
    fn validation_cache_rejects_other_task_or_changed_commit() {
        let now = Utc::now();
        let cache = ValidationCache {
            timestamp: now,
            task_id: "task-1".into(),
            commit_hash: Some("abc123".into()),
            overall: true,
            cursor_verified: true,
        };
        assert!(!cache.is_fresh_for("task-2", now, Some("abc123")));
        assert!(!cache.is_fresh_for("task-1", now, Some("def456")));
        assert!(cache.is_fresh_for("task-1", now, Some("abc123")));
    }

    #[test]
    fn goal_length_bounds() {
        assert!(Validator::validate_goal("short").is_err());
        assert!(Validator::validate_goal(&"x".repeat(501)).is_err());
        assert_eq!(
            Validator::validate_goal("  a valid goal string  ").unwrap(),
            "a valid goal string"
        );
    }

    #[test]
    fn transition_validation_delegates_to_state_engine() {
        assert!(Validator::validate_state_transition(
            WorkflowState::Understanding,
            WorkflowState::Designing
        )
        .is_ok());
        assert!(Validator::validate_state_transition(
            WorkflowState::Understanding,
            WorkflowState::Testing
        )
        .is_err());
    }

    #[test]
    fn cross_validation_detects_id_mismatch() {
        let now = Utc::now();
        let task = Task {
            id: "task-1".into(),
            goal: "a valid goal string here".into(),
            status: crate::models::TaskStatus::Active,
            priority: crate::models::Priority::Medium,
            tags: vec![],
            created_at: now,
            activated_at: Some(now),
            completed_at: None,
            estimated_time_hours: None,
            actual_time_hours: None,
            requirements: None,
            workflow: Some(crate::models::Workflow::new(now)),
            review_checklist: None,
            state_checklists: Default::default(),
        };
        let legacy = LegacyTask {
            task_id: "task-2".into(),
            original_goal: task.goal.clone(),
            status: "in_progress".into(),
            started_at: now,
            completed_at: None,
            workflow: task.workflow.clone(),
            requirements: None,
            review_checklist: None,
            extra: Default::default(),
        };
        let result = Validator::validate_both(&task, &legacy);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("id mismatch"));
    }
}
