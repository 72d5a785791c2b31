//! One-shot legacy→queue migration (spec §4.3): the first process to touch
//! a queue that doesn't exist yet (or is empty) and finds a legacy
//! `current-task.json` converts it into a one-task queue, preserving the
//! original file as a timestamped backup. Failure is logged and tolerated
//! — the caller keeps using the legacy file rather than aborting.

use std::path::Path;

use chrono::Utc;
use workflow_core::error::Result;
use workflow_core::models::{LegacyTask, QueueStore, Task, TaskStatus, Workflow};

pub async fn migrate_legacy_into_queue(legacy_path: &Path, queue_path: &Path) -> Result<()> {
    let queue_is_empty_or_absent = match tokio::fs::read(queue_path).await {
        Ok(bytes) => serde_json::from_slice::<QueueStore>(&bytes)
            .map(|s| s.tasks.is_empty())
            .unwrap_or(true),
        Err(_) => true,
    };
    if !queue_is_empty_or_absent {
        return Ok(());
    }

    let Ok(legacy_bytes) = tokio::fs::read(legacy_path).await else {
        return Ok(());
    };
    let legacy: LegacyTask = match serde_json::from_slice(&legacy_bytes) {
        Ok(l) => l,
        Err(e) => {
            tracing::warn!(error = %e, "migration: legacy current-task.json is malformed, skipping");
            return Ok(());
        }
    };

    let now = Utc::now();
    let is_done = legacy.status == "completed";
    let task = Task {
        id: legacy.task_id.clone(),
        goal: legacy.original_goal.clone(),
        status: if is_done {
            TaskStatus::Done
        } else {
            TaskStatus::Active
        },
        priority: workflow_core::models::Priority::Medium,
        tags: Vec::new(),
        created_at: legacy.started_at,
        activated_at: Some(legacy.started_at),
        completed_at: legacy.completed_at,
        estimated_time_hours: None,
        actual_time_hours: None,
        requirements: legacy.requirements.clone(),
        workflow: legacy
            .workflow
            .clone()
            .or_else(|| Some(Workflow::new(legacy.started_at))),
        review_checklist: legacy.review_checklist.clone(),
        state_checklists: Default::default(),
    };

    let mut store = QueueStore::empty(now);
    if !is_done {
        store.active_task_id = Some(task.id.clone());
    }
    store.tasks.push(task);
    store.recompute_metadata(now);

    if let Some(parent) = queue_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_vec_pretty(&store)?;
    let temp_path = queue_path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, &body).await?;
    tokio::fs::rename(&temp_path, queue_path).await?;

    let backup_path = legacy_path.with_file_name(format!(
        "{}.premigration.{}",
        legacy_path.file_name().unwrap().to_string_lossy(),
        now.timestamp()
    ));
    let _ = tokio::fs::copy(legacy_path, &backup_path).await;

    tracing::info!(task_id = %store.tasks[0].id, "migrated legacy current-task.json into tasks.json");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn migrates_legacy_file_when_queue_absent() {
        let dir = tempdir().unwrap();
        let legacy_path = dir.path().join("current-task.json");
        let queue_path = dir.path().join("tasks.json");
        let legacy = LegacyTask {
            task_id: "task-1".into(),
            original_goal: "A goal migrated from the legacy file".into(),
            status: "in_progress".into(),
            started_at: Utc::now(),
            completed_at: None,
            workflow: None,
            requirements: None,
            review_checklist: None,
            extra: Default::default(),
        };
        tokio::fs::write(&legacy_path, serde_json::to_vec(&legacy).unwrap())
            .await
            .unwrap();

        migrate_legacy_into_queue(&legacy_path, &queue_path)
            .await
            .unwrap();

        let bytes = tokio::fs::read(&queue_path).await.unwrap();
        let store: QueueStore = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(store.tasks.len(), 1);
        assert_eq!(store.tasks[0].id, "task-1");
        assert_eq!(store.active_task_id.as_deref(), Some("task-1"));
    }

    #[tokio::test]
    async fn no_op_when_queue_already_populated() {
        let dir = tempdir().unwrap();
        let legacy_path = dir.path().join("current-task.json");
        let queue_path = dir.path().join("tasks.json");
        let now = Utc::now();
        let mut store = QueueStore::empty(now);
        store.tasks.push(Task {
            id: "task-existing".into(),
            goal: "Already present task goal text".into(),
            status: TaskStatus::Active,
            priority: workflow_core::models::Priority::Medium,
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
        });
        tokio::fs::write(&queue_path, serde_json::to_vec(&store).unwrap())
            .await
            .unwrap();

        migrate_legacy_into_queue(&legacy_path, &queue_path)
            .await
            .unwrap();

        let bytes = tokio::fs::read(&queue_path).await.unwrap();
        let reloaded: QueueStore = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(reloaded.tasks.len(), 1);
        assert_eq!(reloaded.tasks[0].id, "task-existing");
    }
}
