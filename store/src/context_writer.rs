//! Regenerates the small deterministic set of context artefacts external
//! AI agents read, per spec §4.9. Writes are idempotent overwrites;
//! [`ContextWriter::clear`] removes them (but never the legacy file).

use std::path::PathBuf;

use workflow_core::checklist::ChecklistRegistry;
use workflow_core::error::Result;
use workflow_core::models::{Task, WorkflowState};
use workflow_core::pattern::StateBasedPattern;
use workflow_core::state_engine;

pub struct ContextWriter {
    status_path: PathBuf,
    next_steps_path: PathBuf,
    warnings_path: PathBuf,
    enforcement_path: PathBuf,
}

impl ContextWriter {
    pub fn new(context_dir: impl Into<std::path::PathBuf>, project_root: impl Into<std::path::PathBuf>) -> Self {
        let context_dir = context_dir.into();
        let project_root = project_root.into();
        ContextWriter {
            status_path: context_dir.join("STATUS.txt"),
            next_steps_path: context_dir.join("NEXT_STEPS.md"),
            warnings_path: context_dir.join("WARNINGS.md"),
            enforcement_path: project_root
                .join(".cursor/rules/000-current-state-enforcement.mdc"),
        }
    }

    /// Path of the `STATUS.txt` artefact this writer maintains.
    pub fn status_path(&self) -> &std::path::Path {
        &self.status_path
    }

    /// Path of the `NEXT_STEPS.md` artefact this writer maintains.
    pub fn next_steps_path(&self) -> &std::path::Path {
        &self.next_steps_path
    }

    /// Regenerate `STATUS.txt`, `NEXT_STEPS.md`, and the enforcement
    /// descriptor for the currently active `task`. `patterns` are the
    /// patterns relevant to the task's current state, folded into
    /// `NEXT_STEPS.md` alongside the registry's hard-coded items (spec §4.7).
    pub async fn regenerate(
        &self,
        task: &Task,
        registry: &ChecklistRegistry,
        patterns: &[StateBasedPattern],
    ) -> Result<()> {
        let Some(workflow) = &task.workflow else {
            return Ok(());
        };
        self.write_status(task, workflow.current_state).await?;
        self.write_next_steps(task, workflow.current_state, registry, patterns)
            .await?;
        self.write_enforcement_descriptor(task, workflow.current_state)
            .await?;
        Ok(())
    }

    async fn write_status(&self, task: &Task, state: WorkflowState) -> Result<()> {
        let progress = state_engine::progress_percent(state);
        let line = format!(
            "[{state}] ({progress}%) {id} — {goal}\n",
            state = state,
            progress = progress,
            id = task.id,
            goal = task.goal
        );
        self.write_atomic(&self.status_path, line.as_bytes()).await
    }

    async fn write_next_steps(
        &self,
        task: &Task,
        state: WorkflowState,
        registry: &ChecklistRegistry,
        patterns: &[StateBasedPattern],
    ) -> Result<()> {
        let items = registry.items_for_with_patterns(state, task, patterns);
        let completions = task.state_checklists.get(state.as_str());
        let mut body = format!("# Next steps — {state}\n\n");
        body.push_str(&format!("Task: {} ({})\n\n", task.goal, task.id));
        for item in items {
            let done = completions
                .and_then(|m| m.get(&item.id))
                .map(|c| c.completed)
                .unwrap_or(false);
            let mark = if done { "x" } else { " " };
            let req = if item.required { "required" } else { "optional" };
            body.push_str(&format!(
                "- [{mark}] **{}** ({req}) — {}\n",
                item.title, item.description
            ));
        }
        if let Some(next) = state_engine::next(state) {
            body.push_str(&format!(
                "\nOnce the required items above are complete, run:\n\n```\nsync --state {next}\n```\n"
            ));
        } else {
            body.push_str("\nOnce the required items above are complete, run:\n\n```\ntask complete\n```\n");
        }
        self.write_atomic(&self.next_steps_path, body.as_bytes())
            .await
    }

    async fn write_enforcement_descriptor(&self, task: &Task, state: WorkflowState) -> Result<()> {
        let body = format!(
            "---\nalwaysApply: true\n---\n\nCurrent workflow state: **{state}** ({progress}%) for task `{id}`.\nDo not perform work that belongs to a later state until this one's checklist is complete.\n",
            state = state,
            progress = state_engine::progress_percent(state),
            id = task.id,
        );
        self.write_atomic(&self.enforcement_path, body.as_bytes())
            .await
    }

    async fn write_atomic(&self, path: &std::path::Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp_path = path.with_extension(format!(
            "{}.tmp",
            path.extension().and_then(|e| e.to_str()).unwrap_or("tmp")
        ));
        tokio::fs::write(&temp_path, bytes).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }

    /// Remove the regenerated artefacts (but never the legacy file) once a
    /// completed task has no successor to describe.
    pub async fn clear(&self) -> Result<()> {
        for path in [&self.status_path, &self.next_steps_path, &self.warnings_path] {
            let _ = tokio::fs::remove_file(path).await;
        }
        let _ = tokio::fs::remove_file(&self.enforcement_path).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;
    use workflow_core::models::{Priority, TaskStatus, Workflow};

    fn sample_task() -> Task {
        let now = Utc::now();
        Task {
            id: "task-1".into(),
            goal: "Write context artefacts for the active task".into(),
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
        }
    }

    #[tokio::test]
    async fn regenerate_writes_status_and_next_steps() {
        let context_dir = tempdir().unwrap();
        let project_dir = tempdir().unwrap();
        let writer = ContextWriter::new(context_dir.path(), project_dir.path());
        let registry = ChecklistRegistry::with_defaults();
        let task = sample_task();
        writer.regenerate(&task, &registry, &[]).await.unwrap();

        let status = tokio::fs::read_to_string(context_dir.path().join("STATUS.txt"))
            .await
            .unwrap();
        assert!(status.contains("UNDERSTANDING"));
        assert!(status.contains("task-1"));

        let next_steps = tokio::fs::read_to_string(context_dir.path().join("NEXT_STEPS.md"))
            .await
            .unwrap();
        assert!(next_steps.contains("Understand requirements"));
    }

    #[tokio::test]
    async fn regenerate_folds_pattern_items_into_next_steps() {
        use workflow_core::pattern::{PatternValidation, ValidationKind, ValidationSeverity};

        let context_dir = tempdir().unwrap();
        let project_dir = tempdir().unwrap();
        let writer = ContextWriter::new(context_dir.path(), project_dir.path());
        let registry = ChecklistRegistry::with_defaults();
        let task = sample_task();
        let pattern = StateBasedPattern {
            id: "no-unwrap".into(),
            title: "Avoid unwrap in production code".into(),
            description: "desc".into(),
            action: "replace unwrap() with ?".into(),
            applicable_states: vec![WorkflowState::Understanding],
            required_states: vec![],
            validation: PatternValidation {
                kind: ValidationKind::CodeCheck,
                rule: "src/**/*.rs::unwrap()".into(),
                message: "found unwrap()".into(),
                severity: ValidationSeverity::Warning,
            },
        };
        writer
            .regenerate(&task, &registry, &[pattern])
            .await
            .unwrap();

        let next_steps = tokio::fs::read_to_string(context_dir.path().join("NEXT_STEPS.md"))
            .await
            .unwrap();
        assert!(next_steps.contains("Avoid unwrap in production code"));
    }

    #[tokio::test]
    async fn clear_removes_artefacts() {
        let context_dir = tempdir().unwrap();
        let project_dir = tempdir().unwrap();
        let writer = ContextWriter::new(context_dir.path(), project_dir.path());
        let registry = ChecklistRegistry::with_defaults();
        writer.regenerate(&sample_task(), &registry, &[]).await.unwrap();
        writer.clear().await.unwrap();
        assert!(!context_dir.path().join("STATUS.txt").exists());
        assert!(!context_dir.path().join("NEXT_STEPS.md").exists());
    }
}
