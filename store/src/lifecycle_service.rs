//! Concrete [`LifecycleService`], composing the queue repository, file
//! sync, validator, checklist registry, pattern provider, and context
//! writer into the five atomic operation shapes of spec §4.8. Every
//! operation here is already running under the file lock acquired inside
//! [`JsonQueueRepository`]'s mutating methods.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use workflow_core::checklist::ChecklistRegistry;
use workflow_core::error::{Result, WorkflowError};
use workflow_core::lifecycle::{CompleteParams, CompletionOutcome, LifecycleService, UpdateStateParams};
use workflow_core::models::{
    NewTaskRequest, ReviewAction, ReviewChecklist, ReviewChecklistItem, StateHistoryEntry, Task,
    WorkflowState,
};
use workflow_core::pattern::PatternProvider;
use workflow_core::repository::QueueRepository;
use workflow_core::validation::Validator;

use crate::config_loader::WorkflowConfig;
use crate::context_writer::ContextWriter;
use crate::file_sync::FileSync;
use crate::json_repository::JsonQueueRepository;
use crate::pattern_provider::FilePatternProvider;

/// Fields the legacy file's editor may annotate and which every sync must
/// preserve verbatim.
const PRESERVE_FIELDS: &[&str] = &["requirements"];

pub struct FileLifecycleService {
    pub repository: Arc<JsonQueueRepository>,
    pub file_sync: FileSync,
    pub context_writer: ContextWriter,
    pub registry: ChecklistRegistry,
    pub config: WorkflowConfig,
    pub pattern_provider: FilePatternProvider,
}

impl FileLifecycleService {
    pub fn new(
        repository: Arc<JsonQueueRepository>,
        file_sync: FileSync,
        context_writer: ContextWriter,
        config: WorkflowConfig,
        pattern_provider: FilePatternProvider,
    ) -> Self {
        FileLifecycleService {
            repository,
            file_sync,
            context_writer,
            registry: ChecklistRegistry::with_defaults(),
            config,
            pattern_provider,
        }
    }

    /// Load the active task preferring the queue, with one 10 ms retry to
    /// ride out a cross-process write race (spec §4.8/§9).
    async fn load_active_with_retry(&self) -> Result<Task> {
        match self.repository.get_active_task().await? {
            Some(task) => Ok(task),
            None => {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                self.repository
                    .get_active_task()
                    .await?
                    .ok_or_else(|| WorkflowError::NotFound("no active task".into()))
            }
        }
    }

    async fn sync_and_regenerate(&self, task: &Task, backup: bool) -> Result<()> {
        self.file_sync
            .sync_from_queue(task, PRESERVE_FIELDS, backup)
            .await?;
        let patterns = match &task.workflow {
            Some(workflow) => self
                .pattern_provider
                .patterns_for_state(workflow.current_state)
                .await
                .unwrap_or_default(),
            None => Vec::new(),
        };
        self.context_writer
            .regenerate(task, &self.registry, &patterns)
            .await
    }
}

#[async_trait]
impl LifecycleService for FileLifecycleService {
    async fn create(&self, request: NewTaskRequest) -> Result<Task> {
        let task = self.repository.create_task(request).await?;
        if task.status == workflow_core::models::TaskStatus::Active {
            self.sync_and_regenerate(&task, false).await?;
        }
        Ok(task)
    }

    async fn activate(&self, task_id: &str) -> Result<Task> {
        let task = self.repository.activate_task(task_id).await?;
        self.sync_and_regenerate(&task, false).await?;
        Ok(task)
    }

    async fn update_state(&self, params: UpdateStateParams) -> Result<Task> {
        let queue_task = self.load_active_with_retry().await?;
        if queue_task.id != params.task_id {
            return Err(WorkflowError::NotActive(format!(
                "task '{}' is not the active task",
                params.task_id
            )));
        }

        // If the legacy file was hand-edited, its workflow is used for the
        // *validation* pass (to surface corruption), but the queue's data
        // drives the actual mutation.
        let manually_edited = self.file_sync.detect_manual_edit(&queue_task).await;
        if manually_edited {
            if let Some(file_task) = self.repository_legacy_task().await? {
                Validator::validate_state_history(&file_task)?;
            }
        }
        Validator::validate_state_history(&queue_task)?;

        let Some(workflow) = queue_task.workflow.clone() else {
            return Err(WorkflowError::HistoryCorruption(
                "active task has no workflow".into(),
            ));
        };
        let current_state = workflow.current_state;
        Validator::validate_state_transition(current_state, params.next_state)?;
        let patterns = self.pattern_provider.patterns_for_state(current_state).await?;
        self.registry
            .require_state_complete_with_patterns(current_state, &queue_task, &patterns)?;

        let now = Utc::now();
        let mut updated = queue_task;
        let mut new_workflow = workflow;
        new_workflow.state_history.push(StateHistoryEntry {
            state: current_state,
            entered_at: new_workflow.state_entered_at,
        });
        new_workflow.current_state = params.next_state;
        new_workflow.state_entered_at = now;
        updated.workflow = Some(new_workflow);

        if params.next_state == WorkflowState::Reviewing {
            updated.review_checklist = Some(default_review_checklist());
        }

        self.repository.update_task(updated.clone()).await?;
        self.sync_and_regenerate(&updated, true).await?;
        Ok(updated)
    }

    async fn complete(&self, params: CompleteParams) -> Result<CompletionOutcome> {
        let task = self.repository.get_task(&params.task_id).await?;
        if task.status != workflow_core::models::TaskStatus::Done {
            let ready = task
                .workflow
                .as_ref()
                .map(|w| w.current_state == WorkflowState::ReadyToCommit)
                .unwrap_or(false);
            if !ready {
                return Err(WorkflowError::NotActive(format!(
                    "task '{}' is not in READY_TO_COMMIT",
                    params.task_id
                )));
            }
        }

        let auto_activate = params.auto_activate_next.or(Some(self.config.auto_activate_next));
        let outcome = self
            .repository
            .complete_task(&params.task_id, auto_activate)
            .await?;

        if outcome.already_completed {
            return Ok(outcome);
        }

        if let Some(next) = &outcome.next_active {
            self.sync_and_regenerate(next, false).await?;
        } else {
            self.file_sync
                .sync_from_queue(&outcome.completed, PRESERVE_FIELDS, false)
                .await?;
            self.context_writer.clear().await?;
        }
        Ok(outcome)
    }

    async fn get_active_task(&self) -> Result<Option<Task>> {
        if let Some(task) = self.repository.get_active_task().await? {
            return Ok(Some(task));
        }
        match self.repository_legacy_task().await? {
            Some(task) if task.status != workflow_core::models::TaskStatus::Done => Ok(Some(task)),
            _ => Ok(None),
        }
    }
}

impl FileLifecycleService {
    async fn repository_legacy_task(&self) -> Result<Option<Task>> {
        let Ok(bytes) = tokio::fs::read(self.file_sync.legacy_path()).await else {
            return Ok(None);
        };
        let legacy: workflow_core::models::LegacyTask = serde_json::from_slice(&bytes)?;
        let status = if legacy.status == "completed" {
            workflow_core::models::TaskStatus::Done
        } else {
            workflow_core::models::TaskStatus::Active
        };
        Ok(Some(Task {
            id: legacy.task_id,
            goal: legacy.original_goal,
            status,
            priority: workflow_core::models::Priority::Medium,
            tags: Vec::new(),
            created_at: legacy.started_at,
            activated_at: Some(legacy.started_at),
            completed_at: legacy.completed_at,
            estimated_time_hours: None,
            actual_time_hours: None,
            requirements: legacy.requirements,
            workflow: legacy.workflow,
            review_checklist: legacy.review_checklist,
            state_checklists: Default::default(),
        }))
    }
}

/// The default `REVIEWING`-state [`ReviewChecklist`]: one automated
/// validation run plus six manual review categories, per spec §4.6.
/// The review checklist instantiated on entering `REVIEWING` (§4.8), and
/// also lazily instantiated by `review check`/`review execute` when the
/// active task hasn't reached `REVIEWING` yet (§6: `check` "is accepted
/// even if the checklist was never instantiated").
pub fn default_review_checklist() -> ReviewChecklist {
    let manual = |id: &str, title: &str, expected: &str| ReviewChecklistItem {
        id: id.to_string(),
        title: title.to_string(),
        description: format!("Manually review: {title}"),
        action: ReviewAction::Review {
            file_globs: vec!["**/*".to_string()],
            expected_result: expected.to_string(),
        },
        completion: Default::default(),
    };

    ReviewChecklist {
        items: vec![
            ReviewChecklistItem {
                id: "automated-validation".into(),
                title: "Automated validation".into(),
                description: "Run the project's validation command.".into(),
                action: ReviewAction::Command {
                    command: "cargo test".to_string(),
                    expected_exit_code: 0,
                    expected_substrings: vec![],
                },
                completion: Default::default(),
            },
            manual(
                "requirements-coverage",
                "Requirements coverage",
                "every tagged requirement is addressed",
            ),
            manual(
                "code-quality",
                "Code quality",
                "no obvious quality issues remain",
            ),
            manual(
                "error-handling",
                "Error handling",
                "errors are handled, not swallowed",
            ),
            manual(
                "test-coverage",
                "Test coverage",
                "new behavior is covered by tests",
            ),
            manual(
                "documentation",
                "Documentation",
                "public surfaces are documented where needed",
            ),
            manual(
                "security-review",
                "Security review",
                "no new injection/secrets/permission issues",
            ),
        ],
    }
}
