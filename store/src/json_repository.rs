//! File-backed [`QueueRepository`], the authoritative `tasks.json` store
//! described in spec §4.3. Every mutating method takes the process-wide
//! file lock for its whole duration; reads do not.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::OnceCell;
use workflow_core::error::{Result, WorkflowError};
use workflow_core::lifecycle::CompletionOutcome;
use workflow_core::models::{
    actual_time_hours, parse_estimated_time, NewTaskRequest, Priority, QueueStore, Task,
    TaskStatus, Workflow,
};
use workflow_core::repository::{QueueRepository, QueueStats, TaskFilter};
use workflow_core::validation::Validator;

use crate::file_lock::{FileLock, DEFAULT_TIMEOUT};
use crate::migration;
use crate::retry::with_retry;

static ID_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Generate a `task-<epoch_ms>-<disambiguator>` id, unique even when two
/// creations land in the same millisecond (spec §9's open question).
fn generate_task_id(existing: &[Task]) -> String {
    loop {
        let ms = Utc::now().timestamp_millis();
        let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let candidate = format!("task-{ms}-{counter:04x}");
        if !existing.iter().any(|t| t.id == candidate) {
            return candidate;
        }
    }
}

/// Total ordering used both for auto-activation and for the `QUEUED`
/// segment of `listTasks`: priority rank descending, then `createdAt`
/// ascending, then id ascending.
fn queued_order_key(t: &Task) -> (std::cmp::Reverse<Priority>, chrono::DateTime<Utc>, String) {
    (
        std::cmp::Reverse(t.priority),
        t.created_at,
        t.id.clone(),
    )
}

pub struct JsonQueueRepository {
    queue_path: PathBuf,
    legacy_path: PathBuf,
    lock_timeout: Duration,
    migrated: OnceCell<()>,
}

impl JsonQueueRepository {
    /// `context_dir` is the `.ai-context/` directory; `tasks.json` and
    /// `current-task.json` live directly inside it.
    pub fn new(context_dir: impl Into<PathBuf>) -> Self {
        let context_dir = context_dir.into();
        JsonQueueRepository {
            queue_path: context_dir.join("tasks.json"),
            legacy_path: context_dir.join("current-task.json"),
            lock_timeout: DEFAULT_TIMEOUT,
            migrated: OnceCell::new(),
        }
    }

    pub fn queue_path(&self) -> &Path {
        &self.queue_path
    }

    async fn ensure_migrated(&self) -> Result<()> {
        self.migrated
            .get_or_try_init(|| async {
                migration::migrate_legacy_into_queue(&self.legacy_path, &self.queue_path).await
            })
            .await?;
        Ok(())
    }

    async fn read_store(&self) -> Result<QueueStore> {
        self.ensure_migrated().await?;
        with_retry(|| async {
            match tokio::fs::read(&self.queue_path).await {
                Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Ok(QueueStore::empty(Utc::now()))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn write_store(&self, mut store: QueueStore) -> Result<()> {
        store.recompute_metadata(Utc::now());
        let body = serde_json::to_vec_pretty(&store)?;
        let temp_path = self.queue_path.with_extension("json.tmp");
        if let Some(parent) = self.queue_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        with_retry(|| async {
            tokio::fs::write(&temp_path, &body).await?;
            tokio::fs::rename(&temp_path, &self.queue_path).await?;
            Ok(())
        })
        .await
    }

    /// Pick the next `QUEUED` task to auto-activate, per spec §4.3: highest
    /// priority, then oldest, then id ascending.
    fn pick_next_queued(store: &QueueStore) -> Option<String> {
        store
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Queued)
            .min_by_key(|t| queued_order_key(t))
            .map(|t| t.id.clone())
    }

    async fn with_lock<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(QueueStore) -> Result<(QueueStore, T)>,
    {
        let lock = FileLock::acquire(&self.queue_path, self.lock_timeout).await?;
        let result = async {
            let store = self.read_store().await?;
            let (new_store, out) = f(store)?;
            self.write_store(new_store).await?;
            Ok(out)
        }
        .await;
        lock.release().await;
        result
    }
}

#[async_trait::async_trait]
impl QueueRepository for JsonQueueRepository {
    async fn create_task(&self, request: NewTaskRequest) -> Result<Task> {
        let goal = Validator::validate_goal(&request.goal)?;
        let priority = request.priority.unwrap_or_default();
        let now = Utc::now();
        let estimated_time_hours = request
            .estimated_time
            .as_deref()
            .map(parse_estimated_time);

        self.with_lock(|mut store| {
            let id = generate_task_id(&store.tasks);
            let has_active = store.active_task_id.is_some();
            let becomes_active = !has_active && !request.force_queue;

            let task = Task {
                id: id.clone(),
                goal,
                status: if becomes_active {
                    TaskStatus::Active
                } else {
                    TaskStatus::Queued
                },
                priority,
                tags: request.tags.clone(),
                created_at: now,
                activated_at: if becomes_active { Some(now) } else { None },
                completed_at: None,
                estimated_time_hours,
                actual_time_hours: None,
                requirements: request.requirements.clone(),
                workflow: if becomes_active {
                    Some(Workflow::new(now))
                } else {
                    None
                },
                review_checklist: None,
                state_checklists: Default::default(),
            };

            if becomes_active {
                store.active_task_id = Some(id);
            }
            store.tasks.push(task.clone());
            Ok((store, task))
        })
        .await
    }

    async fn get_task(&self, id: &str) -> Result<Task> {
        let store = self.read_store().await?;
        store
            .find(id)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found_task(id))
    }

    async fn get_active_task(&self) -> Result<Option<Task>> {
        let store = self.read_store().await?;
        Ok(store.active_task().cloned())
    }

    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        let store = self.read_store().await?;
        let mut tasks: Vec<Task> = store
            .tasks
            .iter()
            .filter(|t| filter.include_archived || t.status != TaskStatus::Archived)
            .filter(|t| filter.status.is_empty() || filter.status.contains(&t.status))
            .filter(|t| filter.priority.map(|p| p == t.priority).unwrap_or(true))
            .filter(|t| {
                filter
                    .tag
                    .as_ref()
                    .map(|tag| t.tags.iter().any(|x| x == tag))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        tasks.sort_by(|a, b| {
            rank(a).cmp(&rank(b)).then_with(|| match (a.status, b.status) {
                (TaskStatus::Queued, TaskStatus::Queued) => {
                    queued_order_key(a).cmp(&queued_order_key(b))
                }
                (TaskStatus::Done, TaskStatus::Done) => {
                    b.completed_at.cmp(&a.completed_at)
                }
                _ => a.id.cmp(&b.id),
            })
        });

        if let Some(limit) = filter.limit {
            tasks.truncate(limit);
        }
        Ok(tasks)
    }

    async fn update_task(&self, task: Task) -> Result<()> {
        self.with_lock(|mut store| {
            let slot = store
                .find_mut(&task.id)
                .ok_or_else(|| WorkflowError::not_found_task(&task.id))?;
            *slot = task;
            Ok((store, ()))
        })
        .await
    }

    async fn activate_task(&self, id: &str) -> Result<Task> {
        let now = Utc::now();
        self.with_lock(|mut store| {
            if !store.tasks.iter().any(|t| t.id == id) {
                return Err(WorkflowError::not_found_task(id));
            }
            if store.active_task_id.as_deref() == Some(id) {
                return Ok((store.clone(), store.find(id).cloned().unwrap()));
            }
            if let Some(current_active) = store.active_task_id.clone() {
                if let Some(t) = store.find_mut(&current_active) {
                    t.status = TaskStatus::Queued;
                }
            }
            let target = store.find_mut(id).unwrap();
            target.status = TaskStatus::Active;
            target.activated_at.get_or_insert(now);
            if target.workflow.is_none() {
                target.workflow = Some(Workflow::new(now));
            }
            store.active_task_id = Some(id.to_string());
            let activated = store.find(id).cloned().unwrap();
            Ok((store, activated))
        })
        .await
    }

    async fn complete_task(
        &self,
        id: &str,
        auto_activate_next: Option<bool>,
    ) -> Result<CompletionOutcome> {
        let now = Utc::now();
        self.with_lock(|mut store| {
            let task = store
                .find(id)
                .cloned()
                .ok_or_else(|| WorkflowError::not_found_task(id))?;

            if task.status == TaskStatus::Done || task.status == TaskStatus::Archived {
                return Ok((
                    store,
                    CompletionOutcome {
                        completed: task,
                        next_active: None,
                        already_completed: true,
                    },
                ));
            }

            if store.active_task_id.as_deref() != Some(id) {
                return Err(WorkflowError::NotActive(format!(
                    "task '{id}' is not the active task"
                )));
            }

            let completed_task = {
                let slot = store.find_mut(id).unwrap();
                slot.status = TaskStatus::Done;
                slot.completed_at = Some(now);
                if let Some(activated_at) = slot.activated_at {
                    slot.actual_time_hours = Some(actual_time_hours(activated_at, now));
                }
                slot.clone()
            };
            store.active_task_id = None;

            let should_auto_activate = auto_activate_next.unwrap_or(true);
            let mut next_active = None;
            if should_auto_activate {
                if let Some(next_id) = Self::pick_next_queued(&store) {
                    let target = store.find_mut(&next_id).unwrap();
                    target.status = TaskStatus::Active;
                    target.activated_at.get_or_insert(now);
                    if target.workflow.is_none() {
                        target.workflow = Some(Workflow::new(now));
                    }
                    store.active_task_id = Some(next_id.clone());
                    next_active = store.find(&next_id).cloned();
                }
            }

            Ok((
                store,
                CompletionOutcome {
                    completed: completed_task,
                    next_active,
                    already_completed: false,
                },
            ))
        })
        .await
    }

    async fn archive_task(&self, id: &str) -> Result<Task> {
        self.with_lock(|mut store| {
            let slot = store
                .find_mut(id)
                .ok_or_else(|| WorkflowError::not_found_task(id))?;
            if slot.status != TaskStatus::Done {
                return Err(WorkflowError::Validation(format!(
                    "task '{id}' must be DONE before it can be archived"
                )));
            }
            slot.status = TaskStatus::Archived;
            let archived = slot.clone();
            Ok((store, archived))
        })
        .await
    }

    async fn archive_completed_older_than(&self, older_than_days: i64) -> Result<Vec<String>> {
        let cutoff = Utc::now() - chrono::Duration::days(older_than_days);
        self.with_lock(|mut store| {
            let mut archived_ids = Vec::new();
            for t in store.tasks.iter_mut() {
                if t.status == TaskStatus::Done {
                    if let Some(completed_at) = t.completed_at {
                        if completed_at < cutoff {
                            t.status = TaskStatus::Archived;
                            archived_ids.push(t.id.clone());
                        }
                    }
                }
            }
            Ok((store, archived_ids))
        })
        .await
    }

    async fn stats(&self) -> Result<QueueStats> {
        let store = self.read_store().await?;
        Ok(QueueStats {
            total: store.metadata.total_tasks,
            queued: store.metadata.queued_count,
            active: store.metadata.active_count,
            completed: store.metadata.completed_count,
            archived: store.metadata.archived_count,
        })
    }
}

/// Rank used to sort the active/queued/done/archived segments relative to
/// one another, per spec §4.3's `listTasks` ordering.
fn rank(t: &Task) -> u8 {
    match t.status {
        TaskStatus::Active => 0,
        TaskStatus::Queued => 1,
        TaskStatus::Done => 2,
        TaskStatus::Archived => 3,
    }
}
