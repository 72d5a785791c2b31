//! Workflow Core Library
//!
//! Foundational domain models, pure state-machine logic, and the trait
//! seams (`QueueRepository`, `PatternProvider`, `LifecycleService`) that
//! the `store` crate implements and the `cli` crate drives. Nothing in
//! this crate touches a filesystem path or spawns a process.
//!
//! # Architecture
//!
//! - [`models`] — `WorkflowState`, `Task`, `QueueStore`, `LegacyTask`, and
//!   the other persisted shapes.
//! - [`error`] — `WorkflowError` and the shared `Result` alias.
//! - [`state_engine`] — pure functions over the six-state sequence.
//! - [`validation`] — goal/transition/history/cross-store validation.
//! - [`checklist`] — the per-state checklist registry and gating rule.
//! - [`pattern`] — state-scoped pattern model and the `PatternProvider` seam.
//! - [`repository`] — the `QueueRepository` persistence trait.
//! - [`lifecycle`] — the `LifecycleService` trait composing everything above.

pub mod checklist;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod pattern;
pub mod repository;
pub mod state_engine;
pub mod validation;

pub use checklist::{ChecklistItem, ChecklistRegistry};
pub use error::{Result, WorkflowError};
pub use lifecycle::{CompleteParams, CompletionOutcome, LifecycleService, UpdateStateParams};
pub use models::{
    LegacyTask, NewTaskRequest, Priority, QueueMetadata, QueueStore, Task, TaskStatus, Workflow,
    WorkflowState,
};
pub use pattern::{PatternProvider, StateBasedPattern};
pub use repository::{QueueRepository, QueueStats, TaskFilter};
pub use validation::Validator;

/// Current version of the core crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current crate name.
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_constants() {
        assert!(!VERSION.is_empty());
        assert_eq!(CRATE_NAME, "workflow-core");
    }

    #[test]
    fn test_re_exports() {
        let state = WorkflowState::Understanding;
        assert_eq!(state.to_string(), "UNDERSTANDING");

        let error = WorkflowError::not_found_task("task-1");
        assert!(error.is_not_found());
    }
}
