//! Contract test helpers for validating [`QueueRepository`] implementations.
//!
//! Runs the same suite against both [`crate::repository::MockQueueRepository`]
//! and the file-backed repository so the two stay behaviourally aligned.

use workflow_core::error::WorkflowError;
use workflow_core::models::{Priority, TaskStatus};
use workflow_core::repository::QueueRepository;

use crate::builders::NewTaskRequestBuilder;

/// Run the full contract suite against any [`QueueRepository`].
pub async fn test_repository_contract<R: QueueRepository>(repo: &R) {
    test_create_contract(repo).await;
    test_activate_contract(repo).await;
    test_complete_contract(repo).await;
    test_list_contract(repo).await;
    test_archive_contract(repo).await;
    test_stats_contract(repo).await;
}

/// The first task created with no active task becomes `ACTIVE`; the next
/// is queued.
pub async fn test_create_contract<R: QueueRepository>(repo: &R) {
    let first = repo
        .create_task(
            NewTaskRequestBuilder::new()
                .with_goal("The first task ever created in this queue")
                .build(),
        )
        .await
        .expect("create should succeed");
    assert_eq!(first.status, TaskStatus::Active, "first task becomes active");
    assert!(first.workflow.is_some(), "active task has a workflow");

    let second = repo
        .create_task(
            NewTaskRequestBuilder::new()
                .with_goal("The second task, queued behind the first")
                .build(),
        )
        .await
        .expect("create should succeed");
    assert_eq!(second.status, TaskStatus::Queued, "second task is queued");

    let goal_too_short = repo
        .create_task(NewTaskRequestBuilder::new().with_goal("short").build())
        .await;
    assert!(matches!(
        goal_too_short.unwrap_err(),
        WorkflowError::Validation(_)
    ));
}

/// Activating a queued task demotes the previous active task to `QUEUED`.
pub async fn test_activate_contract<R: QueueRepository>(repo: &R) {
    let active = repo
        .create_task(
            NewTaskRequestBuilder::new()
                .with_goal("Currently active task before activation test")
                .build(),
        )
        .await
        .unwrap();
    let queued = repo
        .create_task(
            NewTaskRequestBuilder::new()
                .with_goal("Queued task that will be activated next")
                .build(),
        )
        .await
        .unwrap();

    let activated = repo.activate_task(&queued.id).await.expect("activate should succeed");
    assert_eq!(activated.status, TaskStatus::Active);

    let demoted = repo.get_task(&active.id).await.unwrap();
    assert_eq!(demoted.status, TaskStatus::Queued);

    let missing = repo.activate_task("does-not-exist").await;
    assert!(missing.unwrap_err().is_not_found());
}

/// Completing a non-active task fails; completing twice is idempotent;
/// auto-activation promotes the highest-priority queued task.
pub async fn test_complete_contract<R: QueueRepository>(repo: &R) {
    let active = repo
        .create_task(
            NewTaskRequestBuilder::new()
                .with_goal("The task that will be completed in this test")
                .build(),
        )
        .await
        .unwrap();
    let queued = repo
        .create_task(
            NewTaskRequestBuilder::new()
                .with_goal("A higher priority task waiting in the queue")
                .with_priority(Priority::Critical)
                .build(),
        )
        .await
        .unwrap();

    let not_active = repo.complete_task(&queued.id, Some(false)).await;
    assert!(matches!(
        not_active.unwrap_err(),
        WorkflowError::NotActive(_)
    ));

    let outcome = repo
        .complete_task(&active.id, Some(true))
        .await
        .expect("complete should succeed");
    assert!(!outcome.already_completed);
    assert_eq!(outcome.completed.status, TaskStatus::Done);
    let next = outcome.next_active.expect("next task should auto-activate");
    assert_eq!(next.id, queued.id);
    assert_eq!(next.status, TaskStatus::Active);

    let repeat = repo
        .complete_task(&active.id, Some(false))
        .await
        .expect("completing twice should not error");
    assert!(repeat.already_completed);
}

/// Listing filters by status and respects `limit`.
pub async fn test_list_contract<R: QueueRepository>(repo: &R) {
    for i in 0..3 {
        repo.create_task(
            NewTaskRequestBuilder::new()
                .with_goal(format!("Listable task number {i} for the contract test"))
                .build(),
        )
        .await
        .unwrap();
    }

    let all = repo
        .list_tasks(Default::default())
        .await
        .expect("list should succeed");
    assert!(all.len() >= 3);

    let queued_only = repo
        .list_tasks(crate::builders::TaskFilterBuilder::new()
            .with_status(vec![TaskStatus::Queued])
            .build())
        .await
        .expect("filtered list should succeed");
    assert!(queued_only.iter().all(|t| t.status == TaskStatus::Queued));
}

/// Only `DONE` tasks may be archived.
pub async fn test_archive_contract<R: QueueRepository>(repo: &R) {
    let task = repo
        .create_task(
            NewTaskRequestBuilder::new()
                .with_goal("A task that will be archived after completion")
                .build(),
        )
        .await
        .unwrap();

    let too_early = repo.archive_task(&task.id).await;
    assert!(too_early.is_err(), "archiving a non-done task should fail");

    repo.complete_task(&task.id, Some(false)).await.unwrap();
    let archived = repo.archive_task(&task.id).await.expect("archive should succeed");
    assert_eq!(archived.status, TaskStatus::Archived);
}

/// Stats reflect at least the tasks this suite has created.
pub async fn test_stats_contract<R: QueueRepository>(repo: &R) {
    repo.create_task(
        NewTaskRequestBuilder::new()
            .with_goal("A task created purely to exercise stats")
            .build(),
    )
    .await
    .unwrap();

    let stats = repo.stats().await.expect("stats should succeed");
    assert!(stats.total >= 1);
}
