//! The command implementations behind `ai-workflow`'s subcommands, kept
//! separate from `main.rs` so `integration-tests` can drive the whole stack
//! in-process without spawning a subprocess, per spec §8.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::Utc;
use serde_json::json;
use workflow_core::checklist::ChecklistRegistry;
use workflow_core::error::{Result, WorkflowError};
use workflow_core::lifecycle::{CompleteParams, LifecycleService, UpdateStateParams};
use workflow_core::models::{NewTaskRequest, Priority, ReviewAction, Task, WorkflowState};
use workflow_core::pattern::{PatternProvider, ValidationSeverity};
use workflow_core::repository::QueueRepository;
use workflow_core::state_engine;
use workflow_core::validation::{ValidationCache, Validator};
use workflow_store::ProjectLayout;

use crate::envelope::{Envelope, NextAction};

/// Bundles the project layout and exposes one method per CLI subcommand.
/// Constructing the lifecycle service/pattern provider is cheap (no I/O
/// happens until a method is awaited), so each call builds its own.
pub struct App {
    pub layout: ProjectLayout,
}

impl App {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        App {
            layout: ProjectLayout::new(project_root),
        }
    }

    fn validation_cache_path(&self) -> PathBuf {
        self.layout.context_dir.join("validation-cache.json")
    }

    async fn next_steps_for(&self, task: &Task, registry: &ChecklistRegistry) -> Vec<NextAction> {
        let Some(workflow) = &task.workflow else {
            return vec![NextAction::command(
                "task create <goal>",
                "create or activate a task before continuing",
            )];
        };
        let state = workflow.current_state;
        let provider = self.layout.pattern_provider();
        let patterns = provider.patterns_for_state(state).await.unwrap_or_default();
        let incomplete = registry
            .items_for_with_patterns(state, task, &patterns)
            .into_iter()
            .filter(|item| item.required)
            .filter(|item| {
                !task
                    .state_checklists
                    .get(state.as_str())
                    .and_then(|m| m.get(&item.id))
                    .map(|c| c.completed)
                    .unwrap_or(false)
            })
            .map(|item| {
                NextAction::required_command(
                    format!("complete checklist item '{}'", item.id),
                    item.description.clone(),
                )
            })
            .collect::<Vec<_>>();
        if !incomplete.is_empty() {
            return incomplete;
        }
        match state_engine::next(state) {
            Some(next) => vec![NextAction::command(
                format!("sync --state {next}"),
                format!("all required {state} checklist items are complete"),
            )],
            None => vec![NextAction::command(
                "task complete",
                "all required READY_TO_COMMIT checklist items are complete",
            )],
        }
    }

    pub async fn task_create(
        &self,
        goal: String,
        priority: Option<Priority>,
        tags: Vec<String>,
        estimate: Option<String>,
        satisfies: Vec<String>,
        force: bool,
    ) -> Envelope {
        let service = self.layout.lifecycle_service();
        let requirements = if satisfies.is_empty() {
            None
        } else {
            Some(satisfies.into_iter().collect::<HashSet<_>>())
        };
        let request = NewTaskRequest {
            goal,
            priority,
            tags,
            estimated_time: estimate,
            requirements,
            force_queue: force,
        };
        match service.create(request).await {
            Ok(task) => {
                let next_actions = self.next_steps_for(&task, &service.registry).await;
                Envelope::ok(json!(task), next_actions)
            }
            Err(err) => Envelope::error(&err),
        }
    }

    pub async fn task_status(&self, state_only: bool) -> Envelope {
        let service = self.layout.lifecycle_service();
        match service.get_active_task().await {
            Ok(Some(task)) if state_only => {
                let state = task
                    .workflow
                    .as_ref()
                    .map(|w| w.current_state.to_string())
                    .unwrap_or_else(|| "NONE".to_string());
                Envelope::ok(json!({ "state": state }), Vec::new())
            }
            Ok(Some(task)) => {
                let next_actions = self.next_steps_for(&task, &service.registry).await;
                Envelope::ok(json!(task), next_actions)
            }
            Ok(None) => Envelope::soft_error(
                "no active task",
                vec![NextAction::command(
                    "task create <goal>",
                    "create or activate a task before continuing",
                )],
            ),
            Err(err) => Envelope::error(&err),
        }
    }

    pub async fn task_complete(&self, auto_activate_next: Option<bool>) -> Envelope {
        let service = self.layout.lifecycle_service();
        let active = match service.get_active_task().await {
            Ok(Some(task)) => task,
            Ok(None) => return Envelope::error(&WorkflowError::NotActive("no active task".into())),
            Err(err) => return Envelope::error(&err),
        };
        match service
            .complete(CompleteParams {
                task_id: active.id,
                auto_activate_next,
            })
            .await
        {
            Ok(outcome) => {
                let next_actions = match &outcome.next_active {
                    Some(next) => vec![NextAction::command(
                        "task status",
                        format!("next active task is '{}'", next.id),
                    )],
                    None => vec![NextAction::command(
                        "task create <goal>",
                        "queue is empty — create more work",
                    )],
                };
                Envelope::ok(
                    json!({
                        "completed": outcome.completed,
                        "nextActive": outcome.next_active,
                        "alreadyCompleted": outcome.already_completed,
                    }),
                    next_actions,
                )
            }
            Err(err) => Envelope::error(&err),
        }
    }

    pub async fn sync_state(&self, next_state: WorkflowState) -> Envelope {
        let service = self.layout.lifecycle_service();
        let active = match service.get_active_task().await {
            Ok(Some(task)) => task,
            Ok(None) => return Envelope::error(&WorkflowError::NotActive("no active task".into())),
            Err(err) => return Envelope::error(&err),
        };
        match service
            .update_state(UpdateStateParams {
                task_id: active.id,
                next_state,
            })
            .await
        {
            Ok(task) => {
                let next_actions = self.next_steps_for(&task, &service.registry).await;
                Envelope::ok(json!(task), next_actions)
            }
            Err(err) => Envelope::error(&err),
        }
    }

    pub async fn validate(&self, save: bool, use_cache: bool) -> Envelope {
        let service = self.layout.lifecycle_service();
        let active = match service.get_active_task().await {
            Ok(Some(task)) => task,
            Ok(None) => return Envelope::error(&WorkflowError::NotActive("no active task".into())),
            Err(err) => return Envelope::error(&err),
        };
        let Some(workflow) = &active.workflow else {
            return Envelope::error(&WorkflowError::HistoryCorruption(
                "active task has no workflow".into(),
            ));
        };
        let state = workflow.current_state;

        if use_cache {
            if let Some(cache) = self.read_validation_cache().await {
                if cache.is_fresh_for(&active.id, Utc::now(), None) {
                    return Envelope::validation_result(
                        cache.overall,
                        json!({
                            "overall": cache.overall,
                            "cursorVerified": cache.cursor_verified,
                            "cached": true,
                            "cachedAt": cache.timestamp,
                        }),
                        Vec::new(),
                    );
                }
            }
        }

        let workflow_valid = Validator::validate_state_history(&active).is_ok();
        let files_present = self.required_context_artifacts_present().await;

        let provider = self.layout.pattern_provider();
        let mandatory = match provider.mandatory_patterns_for_state(state).await {
            Ok(patterns) => patterns,
            Err(err) => return Envelope::error(&err),
        };

        let mut results = Vec::new();
        // Per spec §4.5/Design Note §9: blocking is decided by severity
        // alone. `validation.kind` is irrelevant here — command_run/
        // code_check/custom patterns are only non-blocking by default
        // (i.e. when authored with warning/info severity); an explicit
        // `error` severity on any kind still flips `overall`.
        let mut patterns_ok = true;
        for pattern in &mandatory {
            match provider.verify_pattern(&pattern.id).await {
                Ok(verification) => {
                    if !verification.passed && verification.severity == ValidationSeverity::Error {
                        patterns_ok = false;
                    }
                    results.push(json!(verification));
                }
                Err(err) => return Envelope::error(&err),
            }
        }

        let overall = workflow_valid && files_present && patterns_ok;

        if save {
            let cache = ValidationCache {
                timestamp: Utc::now(),
                task_id: active.id.clone(),
                commit_hash: None,
                overall,
                cursor_verified: true,
            };
            let _ = self.write_validation_cache(&cache).await;
        }

        let next_actions = if overall {
            vec![NextAction::command(
                "sync --state <next>",
                "all mandatory patterns passed",
            )]
        } else {
            vec![NextAction::required_command(
                "validate verify <pattern-id>",
                "resolve failing mandatory patterns before progressing",
            )]
        };
        Envelope::validation_result(
            overall,
            json!({ "overall": overall, "results": results }),
            next_actions,
        )
    }

    pub async fn validate_verify(&self, pattern_id: String, notes: Option<String>) -> Envelope {
        let provider = self.layout.pattern_provider();
        match provider.verify_pattern(&pattern_id).await {
            Ok(verification) => Envelope::ok(
                json!({ "verification": verification, "notes": notes }),
                Vec::new(),
            ),
            Err(err) => Envelope::error(&err),
        }
    }

    pub async fn review_status(&self) -> Envelope {
        let service = self.layout.lifecycle_service();
        match service.get_active_task().await {
            Ok(Some(task)) => match &task.review_checklist {
                Some(checklist) => Envelope::ok(
                    json!({ "complete": checklist.is_complete(), "items": checklist.items }),
                    Vec::new(),
                ),
                None => Envelope::ok(
                    json!(null),
                    vec![NextAction::command(
                        "sync --state REVIEWING",
                        "task is not in REVIEWING yet",
                    )],
                ),
            },
            Ok(None) => Envelope::error(&WorkflowError::NotActive("no active task".into())),
            Err(err) => Envelope::error(&err),
        }
    }

    pub async fn review_list(&self) -> Envelope {
        self.review_status().await
    }

    pub async fn review_execute(&self, item_id: String) -> Envelope {
        let service = self.layout.lifecycle_service();
        let mut active = match service.get_active_task().await {
            Ok(Some(task)) => task,
            Ok(None) => return Envelope::error(&WorkflowError::NotActive("no active task".into())),
            Err(err) => return Envelope::error(&err),
        };
        Self::ensure_review_checklist(&mut active);
        let checklist = active.review_checklist.clone().expect("just initialised");
        let Some(item) = checklist.items.iter().find(|i| i.id == item_id).cloned() else {
            return Envelope::error(&WorkflowError::NotFound(format!(
                "review item '{item_id}' not found"
            )));
        };
        let ReviewAction::Command {
            command,
            expected_exit_code,
            expected_substrings,
        } = &item.action
        else {
            return Envelope::error(&WorkflowError::Validation(format!(
                "review item '{item_id}' is not automated — use 'review check' instead"
            )));
        };

        let output = match tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.layout.project_root)
            .output()
            .await
        {
            Ok(output) => output,
            Err(err) => return Envelope::error(&WorkflowError::Io(err.to_string())),
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        let exit_code = output.status.code().unwrap_or(-1);
        let passed = exit_code == *expected_exit_code
            && expected_substrings.iter().all(|s| stdout.contains(s));

        if passed {
            if let Some(checklist) = &mut active.review_checklist {
                if let Some(found) = checklist.items.iter_mut().find(|i| i.id == item_id) {
                    found.completion.completed = true;
                    found.completion.completed_at = Some(Utc::now());
                }
            }
            if let Err(err) = service.repository.update_task(active).await {
                return Envelope::error(&err);
            }
        }

        Envelope::ok(
            json!({ "passed": passed, "exitCode": exit_code, "stdout": stdout }),
            if passed {
                vec![NextAction::command(
                    "review status",
                    "item marked complete",
                )]
            } else {
                vec![NextAction::required_command(
                    format!("review execute {item_id}"),
                    "command did not satisfy its expectations",
                )]
            },
        )
    }

    pub async fn review_check(&self, item_id: String, notes: Option<String>) -> Envelope {
        let service = self.layout.lifecycle_service();
        let mut active = match service.get_active_task().await {
            Ok(Some(task)) => task,
            Ok(None) => return Envelope::error(&WorkflowError::NotActive("no active task".into())),
            Err(err) => return Envelope::error(&err),
        };
        Self::ensure_review_checklist(&mut active);
        let checklist = active.review_checklist.as_mut().expect("just initialised");
        let Some(found) = checklist.items.iter_mut().find(|i| i.id == item_id) else {
            return Envelope::error(&WorkflowError::NotFound(format!(
                "review item '{item_id}' not found"
            )));
        };
        found.completion.completed = true;
        found.completion.completed_at = Some(Utc::now());
        found.completion.notes = notes;

        match service.repository.update_task(active).await {
            Ok(()) => Envelope::ok(json!({ "itemId": item_id }), Vec::new()),
            Err(err) => Envelope::error(&err),
        }
    }

    /// `review check`/`review execute` are tolerant of a task that never
    /// reached `REVIEWING`: per spec §6 the checklist "is created on
    /// demand" rather than rejected as missing.
    fn ensure_review_checklist(task: &mut Task) {
        if task.review_checklist.is_none() {
            task.review_checklist = Some(workflow_store::default_review_checklist());
        }
    }

    /// Required context artefacts per spec §4.5/§4.9: `STATUS.txt` and
    /// `NEXT_STEPS.md` must exist once a task has ever synced state.
    async fn required_context_artifacts_present(&self) -> bool {
        let writer = self.layout.context_writer();
        tokio::fs::try_exists(writer.status_path()).await.unwrap_or(false)
            && tokio::fs::try_exists(writer.next_steps_path()).await.unwrap_or(false)
    }

    async fn read_validation_cache(&self) -> Option<ValidationCache> {
        let bytes = tokio::fs::read(self.validation_cache_path()).await.ok()?;
        let raw: RawValidationCache = serde_json::from_slice(&bytes).ok()?;
        Some(raw.into())
    }

    async fn write_validation_cache(&self, cache: &ValidationCache) -> Result<()> {
        tokio::fs::create_dir_all(&self.layout.context_dir).await?;
        let raw = RawValidationCache::from(cache.clone());
        let bytes = serde_json::to_vec_pretty(&raw)?;
        tokio::fs::write(self.validation_cache_path(), bytes).await?;
        Ok(())
    }
}

/// Serializable mirror of [`ValidationCache`] — kept separate since the
/// domain struct intentionally carries no `serde` derive of its own.
#[derive(serde::Serialize, serde::Deserialize)]
struct RawValidationCache {
    timestamp: chrono::DateTime<Utc>,
    task_id: String,
    commit_hash: Option<String>,
    overall: bool,
    cursor_verified: bool,
}

impl From<ValidationCache> for RawValidationCache {
    fn from(c: ValidationCache) -> Self {
        RawValidationCache {
            timestamp: c.timestamp,
            task_id: c.task_id,
            commit_hash: c.commit_hash,
            overall: c.overall,
            cursor_verified: c.cursor_verified,
        }
    }
}

impl From<RawValidationCache> for ValidationCache {
    fn from(r: RawValidationCache) -> Self {
        ValidationCache {
            timestamp: r.timestamp,
            task_id: r.task_id,
            commit_hash: r.commit_hash,
            overall: r.overall,
            cursor_verified: r.cursor_verified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_then_status_round_trips() {
        let dir = tempdir().unwrap();
        let app = App::new(dir.path());
        let created = app
            .task_create(
                "Build the validation cache for ai-workflow validate".to_string(),
                None,
                vec![],
                None,
                vec![],
                false,
            )
            .await;
        assert_eq!(created.status, "success");

        let status = app.task_status(false).await;
        assert_eq!(status.status, "success");
        assert_eq!(status.data["status"], "ACTIVE");
    }

    #[tokio::test]
    async fn sync_without_checklist_completion_is_blocked() {
        let dir = tempdir().unwrap();
        let app = App::new(dir.path());
        app.task_create(
            "Build the validation cache for ai-workflow validate".to_string(),
            None,
            vec![],
            None,
            vec![],
            false,
        )
        .await;
        let result = app.sync_state(WorkflowState::Designing).await;
        assert_eq!(result.status, "error");
    }

    #[tokio::test]
    async fn status_with_no_active_task_reports_soft_error() {
        let dir = tempdir().unwrap();
        let app = App::new(dir.path());
        let status = app.task_status(false).await;
        assert_eq!(status.status, "error");
        assert_eq!(status.exit_code(), 0);
        assert!(status.data.is_null());
    }

    #[tokio::test]
    async fn failing_validation_exits_non_zero() {
        let dir = tempdir().unwrap();
        let app = App::new(dir.path());
        app.task_create(
            "Build the validation cache for ai-workflow validate".to_string(),
            None,
            vec![],
            None,
            vec![],
            false,
        )
        .await;
        // Creation already wrote STATUS.txt/NEXT_STEPS.md; remove them so
        // the required-artefacts check fails and `overall` is false.
        let writer = app.layout.context_writer();
        let _ = std::fs::remove_file(writer.status_path());
        let _ = std::fs::remove_file(writer.next_steps_path());

        let result = app.validate(false, false).await;
        assert_eq!(result.data["overall"], false);
        assert_eq!(result.exit_code(), 1);
        assert_eq!(result.status, "error");
    }

    #[tokio::test]
    async fn passing_validation_exits_zero() {
        let dir = tempdir().unwrap();
        let app = App::new(dir.path());
        app.task_create(
            "Build the validation cache for ai-workflow validate".to_string(),
            None,
            vec![],
            None,
            vec![],
            false,
        )
        .await;
        // Creation already regenerates context artefacts and no
        // patterns.json/rules.json exists, so `overall` is true.
        let result = app.validate(false, false).await;
        assert_eq!(result.data["overall"], true);
        assert_eq!(result.exit_code(), 0);
        assert_eq!(result.status, "success");
    }

    #[tokio::test]
    async fn review_check_instantiates_checklist_on_demand() {
        let dir = tempdir().unwrap();
        let app = App::new(dir.path());
        app.task_create(
            "Build the validation cache for ai-workflow validate".to_string(),
            None,
            vec![],
            None,
            vec![],
            false,
        )
        .await;
        // Task is still in UNDERSTANDING, well before REVIEWING.
        let result = app
            .review_check("code-quality".to_string(), Some("looks fine".to_string()))
            .await;
        assert_eq!(result.status, "success");

        let status = app.review_status().await;
        assert_eq!(status.status, "success");
        assert!(status.data["items"]
            .as_array()
            .unwrap()
            .iter()
            .any(|i| i["id"] == "code-quality" && i["completion"]["completed"] == true));
    }

    #[tokio::test]
    async fn review_execute_instantiates_checklist_on_demand() {
        let dir = tempdir().unwrap();
        let app = App::new(dir.path());
        app.task_create(
            "Build the validation cache for ai-workflow validate".to_string(),
            None,
            vec![],
            None,
            vec![],
            false,
        )
        .await;
        // "code-quality" is a manual `Review` item, so this exercises the
        // lazily-created checklist without spawning a command: the error
        // must name it as non-automated rather than report a missing
        // checklist, proving the default checklist was instantiated.
        let result = app.review_execute("code-quality".to_string()).await;
        assert_eq!(result.status, "error");
        assert!(result.error.unwrap().contains("not automated"));
    }
}
