//! Integration tests for the mocks crate.
//!
//! Runs the shared [`workflow_mocks::contracts`] suite against both the
//! in-memory mock repository and the real file-backed one, so the two
//! stay behaviourally aligned, plus a handful of mock-specific checks
//! (error injection, call tracking) that don't apply to the file backend.

use workflow_core::error::WorkflowError;
use workflow_core::models::{Priority, TaskStatus};
use workflow_core::repository::QueueRepository;
use workflow_mocks::builders::NewTaskRequestBuilder;
use workflow_mocks::contracts::test_repository_contract;
use workflow_mocks::fixtures::create_test_task;
use workflow_mocks::MockQueueRepository;
use workflow_store::JsonQueueRepository;

#[tokio::test]
async fn mock_repository_satisfies_the_shared_contract() {
    let repo = MockQueueRepository::new();
    test_repository_contract(&repo).await;
}

#[tokio::test]
async fn file_backed_repository_satisfies_the_shared_contract() {
    let dir = tempfile::tempdir().unwrap();
    let repo = JsonQueueRepository::new(dir.path());
    test_repository_contract(&repo).await;
}

#[tokio::test]
async fn mock_repository_basic_operations_are_tracked() {
    let repo = MockQueueRepository::new();

    let task = repo
        .create_task(
            NewTaskRequestBuilder::new()
                .with_goal("A task created to exercise basic mock operations")
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Active);
    repo.assert_called("create_task");

    let retrieved = repo.get_task(&task.id).await.unwrap();
    assert_eq!(retrieved.id, task.id);
    repo.assert_called("get_task");
}

#[tokio::test]
async fn mock_repository_preloaded_with_tasks_reports_consistent_stats() {
    let repo = MockQueueRepository::with_tasks(vec![create_test_task()]);
    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.active, 1);
}

#[tokio::test]
async fn injected_error_surfaces_once_then_clears() {
    let repo = MockQueueRepository::new();
    repo.inject_error(WorkflowError::LockTimeout { path: "tasks.json.lock".into() });

    let first = repo.get_active_task().await;
    assert!(matches!(first, Err(WorkflowError::LockTimeout { .. })));

    let second = repo.get_active_task().await;
    assert!(second.unwrap().is_none());
}

#[tokio::test]
async fn priority_ordering_matches_across_both_backends() {
    for goal_prefix in ["mock", "file"] {
        let dir = tempfile::tempdir().unwrap();
        let file_repo = JsonQueueRepository::new(dir.path());
        let mock_repo = MockQueueRepository::new();

        async fn drive(repo: &dyn QueueRepository, prefix: &str) -> String {
            let first = repo
                .create_task(
                    NewTaskRequestBuilder::new()
                        .with_goal(format!("{prefix} first task goal, long enough here"))
                        .build(),
                )
                .await
                .unwrap();
            repo.create_task(
                NewTaskRequestBuilder::new()
                    .with_goal(format!("{prefix} low priority goal, long enough"))
                    .with_priority(Priority::Low)
                    .build(),
            )
            .await
            .unwrap();
            let critical = repo
                .create_task(
                    NewTaskRequestBuilder::new()
                        .with_goal(format!("{prefix} critical priority goal, long enough"))
                        .with_priority(Priority::Critical)
                        .build(),
                )
                .await
                .unwrap();
            let outcome = repo.complete_task(&first.id, Some(true)).await.unwrap();
            let next = outcome.next_active.expect("a successor should auto-activate");
            assert_eq!(next.id, critical.id);
            next.id
        }

        if goal_prefix == "mock" {
            drive(&mock_repo, goal_prefix).await;
        } else {
            drive(&file_repo, goal_prefix).await;
        }
    }
}
