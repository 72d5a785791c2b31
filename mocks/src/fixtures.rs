//! Standard test fixtures for consistent testing.
//!
//! Provides pre-built tasks in various statuses and a bulk queue builder,
//! mirroring the teacher's fixture module but against the queue task model.

use chrono::Utc;
use workflow_core::models::{NewTaskRequest, Priority, QueueStore, Task, TaskStatus, Workflow};

/// A basic active task with sensible defaults.
pub fn create_test_task() -> Task {
    let now = Utc::now();
    Task {
        id: "task-1".into(),
        goal: "Implement the standard test fixture task".into(),
        status: TaskStatus::Active,
        priority: Priority::Medium,
        tags: vec!["testing".into()],
        created_at: now,
        activated_at: Some(now),
        completed_at: None,
        estimated_time_hours: Some(4.0),
        actual_time_hours: None,
        requirements: None,
        workflow: Some(Workflow::new(now)),
        review_checklist: None,
        state_checklists: Default::default(),
    }
}

/// A task pinned to a given `status`; `Queued` tasks get no workflow.
pub fn create_test_task_with_status(id: &str, status: TaskStatus) -> Task {
    let mut task = create_test_task();
    task.id = id.to_string();
    task.status = status;
    match status {
        TaskStatus::Queued => {
            task.activated_at = None;
            task.workflow = None;
        }
        TaskStatus::Done | TaskStatus::Archived => {
            task.completed_at = Some(Utc::now());
        }
        TaskStatus::Active => {}
    }
    task
}

/// `count` queued tasks spread across priorities, in creation order.
pub fn create_test_tasks(count: usize) -> Vec<Task> {
    let priorities = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];
    (0..count)
        .map(|i| {
            let mut task = create_test_task_with_status(&format!("task-{i}"), TaskStatus::Queued);
            task.priority = priorities[i % priorities.len()];
            task
        })
        .collect()
}

/// One task in each possible [`TaskStatus`].
pub fn create_tasks_in_all_statuses() -> Vec<Task> {
    vec![
        create_test_task_with_status("queued-1", TaskStatus::Queued),
        create_test_task_with_status("active-1", TaskStatus::Active),
        create_test_task_with_status("done-1", TaskStatus::Done),
        create_test_task_with_status("archived-1", TaskStatus::Archived),
    ]
}

/// A [`QueueStore`] with one active task and the rest queued, metadata
/// already reconciled.
pub fn create_queue_store_with_tasks(tasks: Vec<Task>) -> QueueStore {
    let now = Utc::now();
    let mut store = QueueStore::empty(now);
    store.active_task_id = tasks
        .iter()
        .find(|t| t.status == TaskStatus::Active)
        .map(|t| t.id.clone());
    store.tasks = tasks;
    store.recompute_metadata(now);
    store
}

/// A standard [`NewTaskRequest`] for testing creation.
pub fn create_new_task_request() -> NewTaskRequest {
    NewTaskRequest {
        goal: "A new task created for fixture-driven tests".into(),
        priority: Some(Priority::Medium),
        tags: vec!["testing".into()],
        estimated_time: Some("2 hours".into()),
        requirements: None,
        force_queue: false,
    }
}

/// [`create_new_task_request`] with an explicit goal.
pub fn create_new_task_request_with_goal(goal: &str) -> NewTaskRequest {
    let mut request = create_new_task_request();
    request.goal = goal.to_string();
    request
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_statuses_fixture_covers_every_variant() {
        let tasks = create_tasks_in_all_statuses();
        assert_eq!(tasks.len(), 4);
        assert!(tasks.iter().any(|t| t.status == TaskStatus::Queued));
        assert!(tasks.iter().any(|t| t.status == TaskStatus::Active));
        assert!(tasks.iter().any(|t| t.status == TaskStatus::Done));
        assert!(tasks.iter().any(|t| t.status == TaskStatus::Archived));
    }

    #[test]
    fn queue_store_fixture_has_consistent_metadata() {
        let store = create_queue_store_with_tasks(create_test_tasks(3));
        assert_eq!(store.metadata.total_tasks, 3);
    }
}
