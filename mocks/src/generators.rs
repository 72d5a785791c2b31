//! Random test data generators using the fake crate.
//!
//! Provides realistic random data for goals, tags, and priorities without
//! reaching for property-based testing — the task model's invariants
//! (linear state order, single active task) are exercised more directly by
//! [`crate::contracts`] than a generated-input strategy would catch.

use std::collections::HashSet;

use chrono::Utc;
use fake::faker::lorem::en::{Paragraph, Sentence};
use fake::Fake;
use rand::seq::SliceRandom;
use rand::Rng;
use workflow_core::models::{NewTaskRequest, Priority, Task, TaskStatus, Workflow};

/// Generate a realistic task goal sentence, long enough to satisfy the
/// 10-500 character validation bound.
pub fn generate_goal() -> String {
    loop {
        let sentence: String = Sentence(6..20).fake();
        if sentence.len() >= 10 {
            return sentence;
        }
    }
}

/// Generate a realistic requirements paragraph, split into tag-like lines.
pub fn generate_requirements() -> HashSet<String> {
    let paragraph: String = Paragraph(2..4).fake();
    paragraph
        .split('.')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Generate a realistic tag from a fixed pool.
pub fn generate_tag() -> String {
    let tags = [
        "backend", "frontend", "infra", "security", "docs", "testing", "perf", "api",
    ];
    tags.choose(&mut rand::thread_rng()).unwrap().to_string()
}

/// Generate a random [`Priority`].
pub fn generate_priority() -> Priority {
    let priorities = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];
    *priorities.choose(&mut rand::thread_rng()).unwrap()
}

/// Generate a random estimated-time phrase in the forms spec §3 parses.
pub fn generate_estimated_time() -> String {
    let units = ["hours", "days", "weeks", "minutes"];
    let n: u32 = rand::thread_rng().gen_range(1..10);
    let unit = units.choose(&mut rand::thread_rng()).unwrap();
    format!("{n} {unit}")
}

/// Generate a request ready for [`workflow_core::repository::QueueRepository::create_task`].
pub fn generate_new_task_request() -> NewTaskRequest {
    NewTaskRequest {
        goal: generate_goal(),
        priority: Some(generate_priority()),
        tags: (0..rand::thread_rng().gen_range(0..3))
            .map(|_| generate_tag())
            .collect(),
        estimated_time: Some(generate_estimated_time()),
        requirements: Some(generate_requirements()),
        force_queue: false,
    }
}

/// Generate a standalone [`Task`] in a specific status, not wired into any
/// [`workflow_core::models::QueueStore`].
pub fn generate_task_with_status(id: &str, status: TaskStatus) -> Task {
    let now = Utc::now();
    let workflow = match status {
        TaskStatus::Queued => None,
        _ => Some(Workflow::new(now)),
    };
    Task {
        id: id.to_string(),
        goal: generate_goal(),
        status,
        priority: generate_priority(),
        tags: vec![generate_tag()],
        created_at: now,
        activated_at: if status == TaskStatus::Queued { None } else { Some(now) },
        completed_at: if status == TaskStatus::Done || status == TaskStatus::Archived {
            Some(now)
        } else {
            None
        },
        estimated_time_hours: Some(4.0),
        actual_time_hours: None,
        requirements: Some(generate_requirements()),
        workflow,
        review_checklist: None,
        state_checklists: Default::default(),
    }
}

/// Configurable task generator, producing tasks with a shared tag pool.
pub struct TaskGenerator {
    pub tag_pool: Vec<String>,
}

impl Default for TaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGenerator {
    pub fn new() -> Self {
        TaskGenerator {
            tag_pool: vec!["backend".into(), "frontend".into(), "infra".into()],
        }
    }

    pub fn generate(&self, id: &str, status: TaskStatus) -> Task {
        let mut task = generate_task_with_status(id, status);
        task.tags = vec![self.tag_pool.choose(&mut rand::thread_rng()).unwrap().clone()];
        task
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_goal_passes_length_bounds() {
        for _ in 0..20 {
            let goal = generate_goal();
            assert!(goal.len() >= 10 && goal.len() <= 500);
        }
    }

    #[test]
    fn generated_request_builds_a_valid_task() {
        let request = generate_new_task_request();
        assert!(!request.goal.is_empty());
        assert!(request.priority.is_some());
    }
}
