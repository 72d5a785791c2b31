use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkflowError};

/// The six fixed phases of the development lifecycle.
///
/// Ordering is authoritative: the index of a state in [`WorkflowState::ALL`]
/// is the only legal ordering, and every transition must move exactly one
/// index forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    Understanding,
    Designing,
    Implementing,
    Testing,
    Reviewing,
    ReadyToCommit,
}

impl WorkflowState {
    /// All states in their canonical order.
    pub const ALL: [WorkflowState; 6] = [
        WorkflowState::Understanding,
        WorkflowState::Designing,
        WorkflowState::Implementing,
        WorkflowState::Testing,
        WorkflowState::Reviewing,
        WorkflowState::ReadyToCommit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Understanding => "UNDERSTANDING",
            WorkflowState::Designing => "DESIGNING",
            WorkflowState::Implementing => "IMPLEMENTING",
            WorkflowState::Testing => "TESTING",
            WorkflowState::Reviewing => "REVIEWING",
            WorkflowState::ReadyToCommit => "READY_TO_COMMIT",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkflowState {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "UNDERSTANDING" => Ok(WorkflowState::Understanding),
            "DESIGNING" => Ok(WorkflowState::Designing),
            "IMPLEMENTING" => Ok(WorkflowState::Implementing),
            "TESTING" => Ok(WorkflowState::Testing),
            "REVIEWING" => Ok(WorkflowState::Reviewing),
            "READY_TO_COMMIT" => Ok(WorkflowState::ReadyToCommit),
            other => Err(WorkflowError::Validation(format!(
                "unknown workflow state: '{other}'"
            ))),
        }
    }
}

impl Serialize for WorkflowState {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for WorkflowState {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        WorkflowState::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

/// Task priority. `Ord` is derived in declaration order, so
/// `Priority::Critical > Priority::Low` holds directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "CRITICAL",
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "CRITICAL" => Ok(Priority::Critical),
            "HIGH" => Ok(Priority::High),
            "MEDIUM" => Ok(Priority::Medium),
            "LOW" => Ok(Priority::Low),
            other => Err(WorkflowError::Validation(format!(
                "unknown priority: '{other}'"
            ))),
        }
    }
}

impl Serialize for Priority {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Priority::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

/// At most one task across the whole queue may be `Active` at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Queued,
    Active,
    Done,
    Archived,
}

/// A single entry in a task's workflow state history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateHistoryEntry {
    pub state: WorkflowState,
    #[serde(rename = "enteredAt")]
    pub entered_at: DateTime<Utc>,
}

/// Per-task workflow progress: current state, when it was entered, and the
/// trail of states passed through on the way here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(rename = "currentState")]
    pub current_state: WorkflowState,
    #[serde(rename = "stateEnteredAt")]
    pub state_entered_at: DateTime<Utc>,
    #[serde(rename = "stateHistory", default)]
    pub state_history: Vec<StateHistoryEntry>,
}

impl Workflow {
    pub fn new(now: DateTime<Utc>) -> Self {
        Workflow {
            current_state: WorkflowState::Understanding,
            state_entered_at: now,
            state_history: Vec::new(),
        }
    }
}

/// Completion state for one checklist item, persisted per task per state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItemCompletion {
    #[serde(default)]
    pub completed: bool,
    #[serde(rename = "completedAt", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One actionable item of a task's [`ReviewChecklist`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewChecklistItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub action: ReviewAction,
    #[serde(default)]
    pub completion: ChecklistItemCompletion,
}

/// What running/checking a [`ReviewChecklistItem`] entails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewAction {
    /// Run a command and compare its exit code / stdout substrings.
    Command {
        command: String,
        expected_exit_code: i32,
        #[serde(default)]
        expected_substrings: Vec<String>,
    },
    /// Manually review files against a glob, with a textual expected result.
    Review {
        #[serde(default)]
        file_globs: Vec<String>,
        expected_result: String,
    },
    /// Manually check a textual expectation with no file scope.
    Check { expected_result: String },
}

/// Instantiated once a task enters `REVIEWING`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewChecklist {
    pub items: Vec<ReviewChecklistItem>,
}

impl ReviewChecklist {
    pub fn is_complete(&self) -> bool {
        self.items.iter().all(|i| i.completion.completed)
    }
}

/// A unit of work tracked through the queue and, while active, through the
/// six-phase workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub goal: String,
    pub status: TaskStatus,
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "activatedAt", skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,
    #[serde(rename = "completedAt", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(rename = "estimatedTime", skip_serializing_if = "Option::is_none")]
    pub estimated_time_hours: Option<f64>,
    #[serde(rename = "actualTime", skip_serializing_if = "Option::is_none")]
    pub actual_time_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<HashSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<Workflow>,
    #[serde(rename = "reviewChecklist", default, skip_serializing_if = "Option::is_none")]
    pub review_checklist: Option<ReviewChecklist>,
    /// Per-state checklist completion, keyed by state name then item id.
    #[serde(rename = "stateChecklists", default)]
    pub state_checklists:
        std::collections::HashMap<String, std::collections::HashMap<String, ChecklistItemCompletion>>,
}

impl Task {
    /// `true` while this task has ever been activated (has a `workflow`).
    pub fn has_workflow(&self) -> bool {
        self.workflow.is_some()
    }
}

/// Input to [`crate::repository::QueueRepository::create_task`].
#[derive(Debug, Clone, Default)]
pub struct NewTaskRequest {
    pub goal: String,
    pub priority: Option<Priority>,
    pub tags: Vec<String>,
    pub estimated_time: Option<String>,
    pub requirements: Option<HashSet<String>>,
    /// Force queuing even when no task is currently active.
    pub force_queue: bool,
}

/// Derived counts kept consistent with [`QueueStore::tasks`] after every
/// mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMetadata {
    #[serde(rename = "totalTasks")]
    pub total_tasks: usize,
    #[serde(rename = "queuedCount")]
    pub queued_count: usize,
    #[serde(rename = "activeCount")]
    pub active_count: usize,
    #[serde(rename = "completedCount")]
    pub completed_count: usize,
    #[serde(rename = "archivedCount")]
    pub archived_count: usize,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

/// The authoritative, persisted root document (`tasks.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStore {
    pub tasks: Vec<Task>,
    #[serde(rename = "activeTaskId")]
    pub active_task_id: Option<String>,
    pub metadata: QueueMetadata,
}

impl QueueStore {
    pub fn empty(now: DateTime<Utc>) -> Self {
        QueueStore {
            tasks: Vec::new(),
            active_task_id: None,
            metadata: QueueMetadata {
                total_tasks: 0,
                queued_count: 0,
                active_count: 0,
                completed_count: 0,
                archived_count: 0,
                last_updated: now,
            },
        }
    }

    /// Recompute [`QueueMetadata`] from `tasks`. Must be called after every
    /// mutation, per invariant 4.
    pub fn recompute_metadata(&mut self, now: DateTime<Utc>) {
        let mut queued = 0;
        let mut active = 0;
        let mut completed = 0;
        let mut archived = 0;
        for t in &self.tasks {
            match t.status {
                TaskStatus::Queued => queued += 1,
                TaskStatus::Active => active += 1,
                TaskStatus::Done => completed += 1,
                TaskStatus::Archived => archived += 1,
            }
        }
        self.metadata = QueueMetadata {
            total_tasks: self.tasks.len(),
            queued_count: queued,
            active_count: active,
            completed_count: completed,
            archived_count: archived,
            last_updated: now,
        };
    }

    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn active_task(&self) -> Option<&Task> {
        self.active_task_id.as_deref().and_then(|id| self.find(id))
    }
}

/// The legacy single-task file (`current-task.json`): a derived, external-
/// facing view of the currently active task. Field names differ from
/// [`Task`] by design — external agents read this exact shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyTask {
    #[serde(rename = "taskId")]
    pub task_id: String,
    #[serde(rename = "originalGoal")]
    pub original_goal: String,
    /// Lowercase, unlike [`TaskStatus`]: `in_progress` or `completed`.
    pub status: String,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "completedAt", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<Workflow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<HashSet<String>>,
    #[serde(rename = "reviewChecklist", default, skip_serializing_if = "Option::is_none")]
    pub review_checklist: Option<ReviewChecklist>,
    /// Fields preserved verbatim across syncs that this crate does not
    /// otherwise model (e.g. editor-added annotations).
    #[serde(flatten)]
    pub extra: std::collections::HashMap<String, serde_json::Value>,
}

/// Parse a human estimate phrase into hours, per the rules in spec §3:
/// `N week[s]` = 40N, `N day[s]` = 8N, `N hour[s]` = N, `N minute[s]`/`Nm` =
/// N/60, a bare integer = hours, anything else = 0.
pub fn parse_estimated_time(phrase: &str) -> f64 {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return 0.0;
    }
    if let Ok(n) = phrase.parse::<f64>() {
        return n;
    }
    let lower = phrase.to_lowercase();
    let mut parts = lower.split_whitespace();
    let Some(num_str) = parts.next() else {
        return 0.0;
    };
    // The compact `Nm` form (e.g. "30m") has no following word, and its
    // number won't parse until the trailing `m` is stripped — check it
    // before the plain-number guard below so it isn't shadowed.
    if parts.clone().next().is_none() {
        if let Some(digits) = num_str.strip_suffix('m') {
            if let Ok(n) = digits.parse::<f64>() {
                return n / 60.0;
            }
        }
    }
    let Ok(n) = num_str.parse::<f64>() else {
        return 0.0;
    };
    match parts.next() {
        Some(unit) if unit.starts_with("week") => n * 40.0,
        Some(unit) if unit.starts_with("day") => n * 8.0,
        Some(unit) if unit.starts_with("hour") => n,
        Some(unit) if unit.starts_with("minute") => n / 60.0,
        _ => 0.0,
    }
}

/// Compute `actualTime` in fractional hours from activation to completion.
pub fn actual_time_hours(activated_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> f64 {
    let seconds = (completed_at - activated_at).num_milliseconds() as f64 / 1000.0;
    seconds / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_state_order_and_roundtrip() {
        assert_eq!(WorkflowState::ALL[0], WorkflowState::Understanding);
        assert_eq!(WorkflowState::ALL[5], WorkflowState::ReadyToCommit);
        for s in WorkflowState::ALL {
            assert_eq!(WorkflowState::from_str(&s.to_string()).unwrap(), s);
        }
        assert_eq!(
            WorkflowState::from_str("  understanding ").unwrap(),
            WorkflowState::Understanding
        );
        assert!(WorkflowState::from_str("NOPE").is_err());
    }

    #[test]
    fn priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn estimated_time_parsing_rules() {
        assert_eq!(parse_estimated_time("2 weeks"), 80.0);
        assert_eq!(parse_estimated_time("1 week"), 40.0);
        assert_eq!(parse_estimated_time("3 days"), 24.0);
        assert_eq!(parse_estimated_time("5 hours"), 5.0);
        assert_eq!(parse_estimated_time("30 minutes"), 0.5);
        assert_eq!(parse_estimated_time("30m"), 0.5);
        assert_eq!(parse_estimated_time("4"), 4.0);
        assert_eq!(parse_estimated_time("nonsense"), 0.0);
        assert_eq!(parse_estimated_time(""), 0.0);
    }

    #[test]
    fn actual_time_computation() {
        let start: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        let end: DateTime<Utc> = "2026-01-01T02:30:00Z".parse().unwrap();
        assert_eq!(actual_time_hours(start, end), 2.5);
    }

    #[test]
    fn metadata_recompute_matches_counts() {
        let now = Utc::now();
        let mut store = QueueStore::empty(now);
        store.tasks.push(Task {
            id: "task-1".into(),
            goal: "Do the thing, a thing worth doing".into(),
            status: TaskStatus::Active,
            priority: Priority::Medium,
            tags: vec![],
            created_at: now,
            activated_at: Some(now),
            completed_at: None,
            estimated_time_hours: None,
            actual_time_hours: None,
            requirements: None,
            workflow: Some(Workflow::new(now)),
            review_checklist: None,
            state_checklists: Default::default(),
        });
        store.recompute_metadata(now);
        assert_eq!(store.metadata.total_tasks, 1);
        assert_eq!(store.metadata.active_count, 1);
        assert_eq!(store.metadata.queued_count, 0);
    }
}
