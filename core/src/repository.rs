//! Persistence seam. Everything above this trait (the lifecycle service,
//! the CLI commands) is written against [`QueueRepository`] and never
//! touches a file path directly — the concrete `store` crate is the only
//! thing that knows `tasks.json` exists.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{NewTaskRequest, Priority, Task, TaskStatus};

/// Optional filters for [`QueueRepository::list_tasks`], per spec §4.3's
/// `listTasks({status?[], limit?, includeArchived=false})`.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Restrict to these statuses; empty means "all" (subject to
    /// `include_archived`).
    pub status: Vec<TaskStatus>,
    pub priority: Option<Priority>,
    pub tag: Option<String>,
    pub limit: Option<usize>,
    /// `ARCHIVED` tasks are excluded unless this is set, even if `status`
    /// explicitly names `Archived`.
    pub include_archived: bool,
}

/// Aggregate counts mirroring [`crate::models::QueueMetadata`], returned by
/// [`QueueRepository::stats`] for CLI status output.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStats {
    pub total: usize,
    pub queued: usize,
    pub active: usize,
    pub completed: usize,
    pub archived: usize,
}

/// CRUD plus queue-ordering operations over the task store. Implementors
/// own locking and atomicity; callers may assume every method here either
/// fully applies or fully fails.
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Insert a new task. Returns the generated id. If no task is
    /// currently active and `request.force_queue` is false, the task is
    /// created directly as `ACTIVE` with a fresh `workflow`; otherwise it
    /// is appended to the queue as `QUEUED`.
    async fn create_task(&self, request: NewTaskRequest) -> Result<Task>;

    /// Fetch a single task by id.
    async fn get_task(&self, id: &str) -> Result<Task>;

    /// The task currently in `ACTIVE` status, if any.
    async fn get_active_task(&self) -> Result<Option<Task>>;

    /// List tasks matching `filter`. Stable ordering per spec §4.3: `ACTIVE`
    /// first, then `QUEUED` by priority-then-age, then `DONE` by
    /// `completedAt` descending, then `ARCHIVED`.
    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>>;

    /// Persist a full replacement of `task` (used by the lifecycle service
    /// after it has computed the next in-memory state).
    async fn update_task(&self, task: Task) -> Result<()>;

    /// Activate `id`. If it is already `ACTIVE`, returns it unchanged. If
    /// another task is currently `ACTIVE`, demotes it to `QUEUED` with its
    /// workflow preserved verbatim. Initialises a fresh `workflow` on the
    /// target if it lacks one.
    async fn activate_task(&self, id: &str) -> Result<Task>;

    /// Mark `id` `DONE`, stamp `completedAt`/`actualTime`, and — unless
    /// suppressed by config or `auto_activate_next` — activate the next
    /// queued task ordered by priority then creation time. If `id` is
    /// already `DONE`, returns it unchanged with `already_completed: true`
    /// rather than failing.
    async fn complete_task(
        &self,
        id: &str,
        auto_activate_next: Option<bool>,
    ) -> Result<crate::lifecycle::CompletionOutcome>;

    /// Mark `id` `ARCHIVED`. Only legal for tasks already `DONE`.
    async fn archive_task(&self, id: &str) -> Result<Task>;

    /// Archive every `DONE` task older than `older_than_days`. Returns the
    /// archived ids.
    async fn archive_completed_older_than(&self, older_than_days: i64) -> Result<Vec<String>>;

    /// Current aggregate counts.
    async fn stats(&self) -> Result<QueueStats>;
}
