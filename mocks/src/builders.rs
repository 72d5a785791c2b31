//! Builder pattern implementations for easy test data construction.
//!
//! Provides fluent builders for [`Task`], [`NewTaskRequest`], and
//! [`TaskFilter`], mirroring the teacher's builder module.

use chrono::{DateTime, Utc};
use workflow_core::models::{NewTaskRequest, Priority, Task, TaskStatus, Workflow};
use workflow_core::repository::TaskFilter;

/// Builder for constructing [`Task`] instances in tests.
pub struct TaskBuilder {
    task: Task,
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        TaskBuilder {
            task: Task {
                id: "task-1".into(),
                goal: "A builder-constructed task for tests".into(),
                status: TaskStatus::Queued,
                priority: Priority::Medium,
                tags: Vec::new(),
                created_at: now,
                activated_at: None,
                completed_at: None,
                estimated_time_hours: None,
                actual_time_hours: None,
                requirements: None,
                workflow: None,
                review_checklist: None,
                state_checklists: Default::default(),
            },
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.task.id = id.into();
        self
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.task.goal = goal.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.task.tags = tags;
        self
    }

    /// Setting `Active`/`Done`/`Archived` instantiates a workflow if one
    /// isn't present yet; setting `Queued` clears it.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        match status {
            TaskStatus::Queued => {
                self.task.activated_at = None;
                self.task.workflow = None;
            }
            TaskStatus::Active => {
                let now = Utc::now();
                self.task.activated_at.get_or_insert(now);
                self.task.workflow.get_or_insert_with(|| Workflow::new(now));
            }
            TaskStatus::Done | TaskStatus::Archived => {
                let now = Utc::now();
                self.task.activated_at.get_or_insert(now);
                self.task.workflow.get_or_insert_with(|| Workflow::new(now));
                self.task.completed_at.get_or_insert(now);
            }
        }
        self
    }

    pub fn with_workflow(mut self, workflow: Workflow) -> Self {
        self.task.workflow = Some(workflow);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.task.created_at = created_at;
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// Builder for constructing [`NewTaskRequest`] instances in tests.
pub struct NewTaskRequestBuilder {
    request: NewTaskRequest,
}

impl Default for NewTaskRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NewTaskRequestBuilder {
    pub fn new() -> Self {
        NewTaskRequestBuilder {
            request: NewTaskRequest {
                goal: "A new request built for tests".into(),
                priority: None,
                tags: Vec::new(),
                estimated_time: None,
                requirements: None,
                force_queue: false,
            },
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.request.goal = goal.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.request.priority = Some(priority);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.request.tags = tags;
        self
    }

    pub fn with_force_queue(mut self, force_queue: bool) -> Self {
        self.request.force_queue = force_queue;
        self
    }

    pub fn build(self) -> NewTaskRequest {
        self.request
    }
}

/// Builder for constructing [`TaskFilter`] instances in tests.
pub struct TaskFilterBuilder {
    filter: TaskFilter,
}

impl Default for TaskFilterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskFilterBuilder {
    pub fn new() -> Self {
        TaskFilterBuilder {
            filter: TaskFilter::default(),
        }
    }

    pub fn with_status(mut self, status: Vec<TaskStatus>) -> Self {
        self.filter.status = status;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.filter.priority = Some(priority);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.filter.limit = Some(limit);
        self
    }

    pub fn with_include_archived(mut self, include_archived: bool) -> Self {
        self.filter.include_archived = include_archived;
        self
    }

    pub fn build(self) -> TaskFilter {
        self.filter
    }
}
