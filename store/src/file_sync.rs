//! Two-way reconciliation between the queue and the legacy single-task
//! file, per spec §4.4. Internal operations always treat the queue as
//! authoritative; this module only produces/consumes the derived view.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use workflow_core::error::Result;
use workflow_core::models::{LegacyTask, Task, TaskStatus};

const MAX_BACKUPS: usize = 5;

pub struct FileSync {
    legacy_path: PathBuf,
    backups_dir: PathBuf,
}

impl FileSync {
    pub fn new(context_dir: impl Into<PathBuf>) -> Self {
        let context_dir = context_dir.into();
        FileSync {
            legacy_path: context_dir.join("current-task.json"),
            backups_dir: context_dir.join("backups"),
        }
    }

    pub fn legacy_path(&self) -> &Path {
        &self.legacy_path
    }

    /// Build the [`LegacyTask`] that `queue_task` synthesises to, honouring
    /// `preserve_fields` copied verbatim from the file currently on disk
    /// (if it exists and carries them).
    async fn synthesize(&self, queue_task: &Task, preserve_fields: &[&str]) -> LegacyTask {
        let existing = self.read_existing().await;

        let status = match queue_task.status {
            TaskStatus::Done | TaskStatus::Archived => "completed",
            _ => "in_progress",
        };

        let mut extra: HashMap<String, serde_json::Value> = HashMap::new();
        if let Some(existing) = &existing {
            for field in preserve_fields {
                if let Some(v) = existing.extra.get(*field) {
                    extra.insert(field.to_string(), v.clone());
                }
            }
        }

        LegacyTask {
            task_id: queue_task.id.clone(),
            original_goal: queue_task.goal.clone(),
            status: status.to_string(),
            started_at: queue_task.created_at,
            completed_at: queue_task.completed_at,
            workflow: queue_task.workflow.clone(),
            requirements: queue_task.requirements.clone(),
            review_checklist: queue_task.review_checklist.clone(),
            extra,
        }
    }

    async fn read_existing(&self) -> Option<LegacyTask> {
        let bytes = tokio::fs::read(&self.legacy_path).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Rewrite `current-task.json` as the derived view of `queue_task`.
    /// `preserve_fields` are copied verbatim from the prior file if
    /// present; `backup` takes a rolling snapshot first.
    pub async fn sync_from_queue(
        &self,
        queue_task: &Task,
        preserve_fields: &[&str],
        backup: bool,
    ) -> Result<()> {
        if backup && tokio::fs::try_exists(&self.legacy_path).await.unwrap_or(false) {
            self.backup_file().await?;
        }
        let legacy = self.synthesize(queue_task, preserve_fields).await;
        self.write_atomic(&legacy).await
    }

    async fn write_atomic(&self, legacy: &LegacyTask) -> Result<()> {
        if let Some(parent) = self.legacy_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(legacy)?;
        let temp_path = self.legacy_path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &body).await?;
        tokio::fs::rename(&temp_path, &self.legacy_path).await?;
        Ok(())
    }

    /// `true` iff the on-disk legacy file's essential fields differ from
    /// what would be synthesised from `queue_task`. Both sides are
    /// normalised (parsed, not byte-compared) so formatting differences
    /// alone never count as a manual edit.
    pub async fn detect_manual_edit(&self, queue_task: &Task) -> bool {
        let Some(existing) = self.read_existing().await else {
            return false;
        };
        let synthesized = self.synthesize(queue_task, &[]).await;
        existing.task_id != synthesized.task_id
            || existing.original_goal != synthesized.original_goal
            || existing.status != synthesized.status
            || existing.workflow.as_ref().map(|w| w.current_state)
                != synthesized.workflow.as_ref().map(|w| w.current_state)
    }

    /// Unconditional timestamped snapshot of the current legacy file into
    /// `backups/`, pruned to the [`MAX_BACKUPS`] most recent afterwards.
    pub async fn backup_file(&self) -> Result<()> {
        let Ok(bytes) = tokio::fs::read(&self.legacy_path).await else {
            return Ok(());
        };
        tokio::fs::create_dir_all(&self.backups_dir).await?;
        let ts = Utc::now().timestamp_millis();
        let backup_path = self
            .backups_dir
            .join(format!("current-task.json.backup.{ts}"));
        tokio::fs::write(&backup_path, &bytes).await?;
        self.prune_backups().await;
        Ok(())
    }

    /// Restore the most recent backup over `current-task.json`.
    pub async fn rollback_from_backup(&self) -> Result<()> {
        if let Some(latest) = self.most_recent_backup().await {
            let bytes = tokio::fs::read(&latest).await?;
            self.write_raw(&bytes).await?;
        }
        Ok(())
    }

    async fn write_raw(&self, bytes: &[u8]) -> Result<()> {
        let temp_path = self.legacy_path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, bytes).await?;
        tokio::fs::rename(&temp_path, &self.legacy_path).await?;
        Ok(())
    }

    async fn list_backups(&self) -> Vec<PathBuf> {
        let Ok(mut entries) = tokio::fs::read_dir(&self.backups_dir).await else {
            return Vec::new();
        };
        let mut paths = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            paths.push(entry.path());
        }
        // Timestamp embedded in the filename sorts lexicographically the
        // same as numerically for fixed-width millisecond epochs.
        paths.sort();
        paths
    }

    async fn most_recent_backup(&self) -> Option<PathBuf> {
        self.list_backups().await.into_iter().next_back()
    }

    /// Keep only the [`MAX_BACKUPS`] most recent backups. Best-effort: two
    /// concurrent prunes may leave fewer than `MAX_BACKUPS`, which spec §5
    /// accepts.
    async fn prune_backups(&self) {
        let backups = self.list_backups().await;
        if backups.len() <= MAX_BACKUPS {
            return;
        }
        for stale in &backups[..backups.len() - MAX_BACKUPS] {
            let _ = tokio::fs::remove_file(stale).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use workflow_core::models::{Priority, Workflow};

    fn sample_task(id: &str) -> Task {
        let now = Utc::now();
        Task {
            id: id.to_string(),
            goal: "A goal long enough to pass validation".into(),
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
    async fn sync_then_no_manual_edit_detected() {
        let dir = tempdir().unwrap();
        let sync = FileSync::new(dir.path());
        let task = sample_task("task-1");
        sync.sync_from_queue(&task, &[], false).await.unwrap();
        assert!(!sync.detect_manual_edit(&task).await);
    }

    #[tokio::test]
    async fn manual_edit_of_state_is_detected() {
        let dir = tempdir().unwrap();
        let sync = FileSync::new(dir.path());
        let task = sample_task("task-1");
        sync.sync_from_queue(&task, &[], false).await.unwrap();

        let mut tampered = task.clone();
        tampered.workflow.as_mut().unwrap().current_state =
            workflow_core::models::WorkflowState::Designing;
        // Overwrite the file directly so the in-memory `task` (queue view)
        // no longer agrees with what's on disk.
        let legacy_bytes = tokio::fs::read(sync.legacy_path()).await.unwrap();
        let mut legacy: LegacyTask = serde_json::from_slice(&legacy_bytes).unwrap();
        legacy.workflow = tampered.workflow.clone();
        tokio::fs::write(sync.legacy_path(), serde_json::to_vec(&legacy).unwrap())
            .await
            .unwrap();

        assert!(sync.detect_manual_edit(&task).await);
    }

    #[tokio::test]
    async fn backups_are_pruned_to_five() {
        let dir = tempdir().unwrap();
        let sync = FileSync::new(dir.path());
        let task = sample_task("task-1");
        sync.sync_from_queue(&task, &[], false).await.unwrap();
        for _ in 0..8 {
            sync.backup_file().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        assert!(sync.list_backups().await.len() <= MAX_BACKUPS);
    }

    #[tokio::test]
    async fn preserved_fields_survive_resync() {
        let dir = tempdir().unwrap();
        let sync = FileSync::new(dir.path());
        let task = sample_task("task-1");
        sync.sync_from_queue(&task, &[], false).await.unwrap();

        // Inject an extra field as if an editor had annotated the file.
        let bytes = tokio::fs::read(sync.legacy_path()).await.unwrap();
        let mut legacy: LegacyTask = serde_json::from_slice(&bytes).unwrap();
        legacy
            .extra
            .insert("editorNote".into(), serde_json::json!("keep me"));
        tokio::fs::write(sync.legacy_path(), serde_json::to_vec(&legacy).unwrap())
            .await
            .unwrap();

        sync.sync_from_queue(&task, &["editorNote"], false)
            .await
            .unwrap();

        let bytes = tokio::fs::read(sync.legacy_path()).await.unwrap();
        let reloaded: LegacyTask = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            reloaded.extra.get("editorNote"),
            Some(&serde_json::json!("keep me"))
        );
    }
}
