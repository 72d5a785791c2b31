//! Mock implementation of [`QueueRepository`].
//!
//! Provides a thread-safe mock repository with error injection and call
//! tracking, mirroring the teacher's `MockTaskRepository` conventions but
//! against the queue-based task model.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use workflow_core::error::{Result, WorkflowError};
use workflow_core::lifecycle::CompletionOutcome;
use workflow_core::models::{
    actual_time_hours, parse_estimated_time, NewTaskRequest, Priority, QueueStore, Task,
    TaskStatus, Workflow,
};
use workflow_core::repository::{QueueRepository, QueueStats, TaskFilter};
use workflow_core::validation::Validator;

struct Inner {
    store: QueueStore,
    next_error: Option<WorkflowError>,
    call_history: Vec<String>,
}

/// Thread-safe in-memory stand-in for the file-backed repository, with
/// error injection and call-history tracking for verification.
pub struct MockQueueRepository {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MockQueueRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockQueueRepository {
    /// Create a new empty mock repository.
    pub fn new() -> Self {
        MockQueueRepository {
            inner: Arc::new(Mutex::new(Inner {
                store: QueueStore::empty(Utc::now()),
                next_error: None,
                call_history: Vec::new(),
            })),
        }
    }

    /// Create a mock repository pre-populated with `tasks`.
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let repo = Self::new();
        {
            let mut inner = repo.inner.lock();
            let now = Utc::now();
            inner.store.active_task_id = tasks
                .iter()
                .find(|t| t.status == TaskStatus::Active)
                .map(|t| t.id.clone());
            inner.store.tasks = tasks;
            inner.store.recompute_metadata(now);
        }
        repo
    }

    /// The next call to any trait method returns `error` instead of
    /// running, then clears itself.
    pub fn inject_error(&self, error: WorkflowError) {
        self.inner.lock().next_error = Some(error);
    }

    pub fn clear_error(&self) {
        self.inner.lock().next_error = None;
    }

    pub fn call_history(&self) -> Vec<String> {
        self.inner.lock().call_history.clone()
    }

    pub fn clear_history(&self) {
        self.inner.lock().call_history.clear();
    }

    pub fn assert_called(&self, method: &str) {
        let history = self.inner.lock().call_history.clone();
        assert!(
            history.iter().any(|call| call.contains(method)),
            "method '{method}' was not called. call history: {history:?}"
        );
    }

    fn record(&self, call: impl Into<String>) {
        self.inner.lock().call_history.push(call.into());
    }

    fn take_injected_error(&self) -> Option<WorkflowError> {
        self.inner.lock().next_error.take()
    }

    fn queued_order_key(t: &Task) -> (std::cmp::Reverse<Priority>, chrono::DateTime<Utc>, String) {
        (std::cmp::Reverse(t.priority), t.created_at, t.id.clone())
    }
}

#[async_trait]
impl QueueRepository for MockQueueRepository {
    async fn create_task(&self, request: NewTaskRequest) -> Result<Task> {
        self.record(format!("create_task(goal={})", request.goal));
        if let Some(e) = self.take_injected_error() {
            return Err(e);
        }
        let goal = Validator::validate_goal(&request.goal)?;
        let now = Utc::now();
        let mut inner = self.inner.lock();
        let count = inner.store.tasks.len();
        let id = format!("task-{}-{:04x}", now.timestamp_millis(), count);
        let becomes_active = inner.store.active_task_id.is_none() && !request.force_queue;
        let task = Task {
            id: id.clone(),
            goal,
            status: if becomes_active { TaskStatus::Active } else { TaskStatus::Queued },
            priority: request.priority.unwrap_or_default(),
            tags: request.tags,
            created_at: now,
            activated_at: if becomes_active { Some(now) } else { None },
            completed_at: None,
            estimated_time_hours: request.estimated_time.as_deref().map(parse_estimated_time),
            actual_time_hours: None,
            requirements: request.requirements,
            workflow: if becomes_active { Some(Workflow::new(now)) } else { None },
            review_checklist: None,
            state_checklists: Default::default(),
        };
        if becomes_active {
            inner.store.active_task_id = Some(id);
        }
        inner.store.tasks.push(task.clone());
        inner.store.recompute_metadata(now);
        Ok(task)
    }

    async fn get_task(&self, id: &str) -> Result<Task> {
        self.record(format!("get_task(id={id})"));
        if let Some(e) = self.take_injected_error() {
            return Err(e);
        }
        self.inner
            .lock()
            .store
            .find(id)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found_task(id))
    }

    async fn get_active_task(&self) -> Result<Option<Task>> {
        self.record("get_active_task()");
        if let Some(e) = self.take_injected_error() {
            return Err(e);
        }
        Ok(self.inner.lock().store.active_task().cloned())
    }

    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        self.record("list_tasks()");
        if let Some(e) = self.take_injected_error() {
            return Err(e);
        }
        let inner = self.inner.lock();
        let mut tasks: Vec<Task> = inner
            .store
            .tasks
            .iter()
            .filter(|t| filter.include_archived || t.status != TaskStatus::Archived)
            .filter(|t| filter.status.is_empty() || filter.status.contains(&t.status))
            .filter(|t| filter.priority.map(|p| p == t.priority).unwrap_or(true))
            .filter(|t| filter.tag.as_ref().map(|tag| t.tags.contains(tag)).unwrap_or(true))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| match (a.status, b.status) {
            (TaskStatus::Active, TaskStatus::Active) => std::cmp::Ordering::Equal,
            (TaskStatus::Active, _) => std::cmp::Ordering::Less,
            (_, TaskStatus::Active) => std::cmp::Ordering::Greater,
            (TaskStatus::Queued, TaskStatus::Queued) => {
                Self::queued_order_key(a).cmp(&Self::queued_order_key(b))
            }
            (TaskStatus::Queued, _) => std::cmp::Ordering::Less,
            (_, TaskStatus::Queued) => std::cmp::Ordering::Greater,
            (TaskStatus::Done, TaskStatus::Done) => b.completed_at.cmp(&a.completed_at),
            (TaskStatus::Done, _) => std::cmp::Ordering::Less,
            (_, TaskStatus::Done) => std::cmp::Ordering::Greater,
            (TaskStatus::Archived, TaskStatus::Archived) => a.id.cmp(&b.id),
        });
        if let Some(limit) = filter.limit {
            tasks.truncate(limit);
        }
        Ok(tasks)
    }

    async fn update_task(&self, task: Task) -> Result<()> {
        self.record(format!("update_task(id={})", task.id));
        if let Some(e) = self.take_injected_error() {
            return Err(e);
        }
        let mut inner = self.inner.lock();
        let now = Utc::now();
        let slot = inner
            .store
            .find_mut(&task.id)
            .ok_or_else(|| WorkflowError::not_found_task(&task.id))?;
        *slot = task;
        inner.store.recompute_metadata(now);
        Ok(())
    }

    async fn activate_task(&self, id: &str) -> Result<Task> {
        self.record(format!("activate_task(id={id})"));
        if let Some(e) = self.take_injected_error() {
            return Err(e);
        }
        let mut inner = self.inner.lock();
        let now = Utc::now();
        if !inner.store.tasks.iter().any(|t| t.id == id) {
            return Err(WorkflowError::not_found_task(id));
        }
        if inner.store.active_task_id.as_deref() == Some(id) {
            return Ok(inner.store.find(id).cloned().unwrap());
        }
        if let Some(current) = inner.store.active_task_id.clone() {
            if let Some(t) = inner.store.find_mut(&current) {
                t.status = TaskStatus::Queued;
            }
        }
        let target = inner.store.find_mut(id).unwrap();
        target.status = TaskStatus::Active;
        target.activated_at.get_or_insert(now);
        if target.workflow.is_none() {
            target.workflow = Some(Workflow::new(now));
        }
        inner.store.active_task_id = Some(id.to_string());
        Ok(inner.store.find(id).cloned().unwrap())
    }

    async fn complete_task(
        &self,
        id: &str,
        auto_activate_next: Option<bool>,
    ) -> Result<CompletionOutcome> {
        self.record(format!("complete_task(id={id})"));
        if let Some(e) = self.take_injected_error() {
            return Err(e);
        }
        let mut inner = self.inner.lock();
        let now = Utc::now();
        let task = inner
            .store
            .find(id)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found_task(id))?;

        if task.status == TaskStatus::Done || task.status == TaskStatus::Archived {
            return Ok(CompletionOutcome {
                completed: task,
                next_active: None,
                already_completed: true,
            });
        }
        if inner.store.active_task_id.as_deref() != Some(id) {
            return Err(WorkflowError::NotActive(format!(
                "task '{id}' is not the active task"
            )));
        }

        let completed = {
            let slot = inner.store.find_mut(id).unwrap();
            slot.status = TaskStatus::Done;
            slot.completed_at = Some(now);
            if let Some(activated_at) = slot.activated_at {
                slot.actual_time_hours = Some(actual_time_hours(activated_at, now));
            }
            slot.clone()
        };
        inner.store.active_task_id = None;

        let mut next_active = None;
        if auto_activate_next.unwrap_or(true) {
            if let Some(next_id) = inner
                .store
                .tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Queued)
                .min_by_key(|t| Self::queued_order_key(t))
                .map(|t| t.id.clone())
            {
                let target = inner.store.find_mut(&next_id).unwrap();
                target.status = TaskStatus::Active;
                target.activated_at.get_or_insert(now);
                if target.workflow.is_none() {
                    target.workflow = Some(Workflow::new(now));
                }
                inner.store.active_task_id = Some(next_id.clone());
                next_active = inner.store.find(&next_id).cloned();
            }
        }
        inner.store.recompute_metadata(now);

        Ok(CompletionOutcome {
            completed,
            next_active,
            already_completed: false,
        })
    }

    async fn archive_task(&self, id: &str) -> Result<Task> {
        self.record(format!("archive_task(id={id})"));
        if let Some(e) = self.take_injected_error() {
            return Err(e);
        }
        let mut inner = self.inner.lock();
        let slot = inner
            .store
            .find_mut(id)
            .ok_or_else(|| WorkflowError::not_found_task(id))?;
        if slot.status != TaskStatus::Done {
            return Err(WorkflowError::Validation(format!(
                "task '{id}' must be DONE before it can be archived"
            )));
        }
        slot.status = TaskStatus::Archived;
        Ok(slot.clone())
    }

    async fn archive_completed_older_than(&self, older_than_days: i64) -> Result<Vec<String>> {
        self.record(format!("archive_completed_older_than(days={older_than_days})"));
        if let Some(e) = self.take_injected_error() {
            return Err(e);
        }
        let now = Utc::now();
        let cutoff = now - chrono::Duration::days(older_than_days);
        let mut inner = self.inner.lock();
        let mut archived = Vec::new();
        for t in inner.store.tasks.iter_mut() {
            if t.status == TaskStatus::Done {
                if let Some(completed_at) = t.completed_at {
                    if completed_at < cutoff {
                        t.status = TaskStatus::Archived;
                        archived.push(t.id.clone());
                    }
                }
            }
        }
        inner.store.recompute_metadata(now);
        Ok(archived)
    }

    async fn stats(&self) -> Result<QueueStats> {
        self.record("stats()");
        if let Some(e) = self.take_injected_error() {
            return Err(e);
        }
        let inner = self.inner.lock();
        Ok(QueueStats {
            total: inner.store.metadata.total_tasks,
            queued: inner.store.metadata.queued_count,
            active: inner.store.metadata.active_count,
            completed: inner.store.metadata.completed_count,
            archived: inner.store.metadata.archived_count,
        })
    }
}
