//! Orchestration trait composing the queue, file sync, validator, checklist
//! registry, pattern provider, and context writer into the five operation
//! shapes of spec §4.8. The concrete implementation (`store::lifecycle_service`)
//! wires real components under a file lock; `core` only fixes the contract,
//! mirroring the split between the teacher's `ProtocolHandler` trait and its
//! `McpTaskHandler` implementation.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{NewTaskRequest, Task, WorkflowState};

/// Input to [`LifecycleService::update_state`].
#[derive(Debug, Clone)]
pub struct UpdateStateParams {
    pub task_id: String,
    pub next_state: WorkflowState,
}

/// Input to [`LifecycleService::complete`].
#[derive(Debug, Clone, Default)]
pub struct CompleteParams {
    pub task_id: String,
    /// Overrides the configured auto-activation default when set.
    pub auto_activate_next: Option<bool>,
}

/// Result of a successful [`LifecycleService::complete`] call.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub completed: Task,
    pub next_active: Option<Task>,
    /// `true` when `id` was already `DONE` and this call was a no-op,
    /// per the round-trip property of spec §8.
    pub already_completed: bool,
}

/// The five operation shapes of spec §4.8, each executed under the
/// process-wide file lock by the concrete implementation.
#[async_trait]
pub trait LifecycleService: Send + Sync {
    /// Validate, create the task via the queue repository, and — if the
    /// created task became `ACTIVE` — sync it to the legacy file and
    /// regenerate context artefacts.
    async fn create(&self, request: NewTaskRequest) -> Result<Task>;

    /// Activate `task_id` (demoting any current active task), sync, and
    /// regenerate artefacts.
    async fn activate(&self, task_id: &str) -> Result<Task>;

    /// Validate and apply one forward workflow transition, enforcing the
    /// state-checklist gate, then sync (with backup) and regenerate
    /// artefacts.
    async fn update_state(&self, params: UpdateStateParams) -> Result<Task>;

    /// Complete the active task from `READY_TO_COMMIT`, possibly
    /// auto-activating a successor, syncing and regenerating artefacts for
    /// whichever task ends up relevant.
    async fn complete(&self, params: CompleteParams) -> Result<CompletionOutcome>;

    /// The currently active task, preferring the queue; falls back to a
    /// non-completed legacy file if the queue has none.
    async fn get_active_task(&self) -> Result<Option<Task>>;
}
