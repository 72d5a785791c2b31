//! File-backed persistence for the workflow engine.
//!
//! Implements every trait `workflow-core` declares against a filesystem:
//! [`JsonQueueRepository`] for `QueueRepository`, [`FilePatternProvider`]
//! for `PatternProvider`, and [`FileLifecycleService`] composing both with
//! [`FileSync`], [`ContextWriter`], and [`FileLock`] into the concrete
//! `LifecycleService`.

pub mod config_loader;
pub mod context_writer;
pub mod file_lock;
pub mod file_sync;
pub mod json_repository;
pub mod lifecycle_service;
pub mod migration;
pub mod pattern_provider;
pub mod retry;

pub use config_loader::WorkflowConfig;
pub use context_writer::ContextWriter;
pub use file_lock::FileLock;
pub use file_sync::FileSync;
pub use json_repository::JsonQueueRepository;
pub use lifecycle_service::{default_review_checklist, FileLifecycleService};
pub use pattern_provider::FilePatternProvider;

/// The on-disk layout of spec §6, rooted at a project directory.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub project_root: std::path::PathBuf,
    pub context_dir: std::path::PathBuf,
}

impl ProjectLayout {
    pub fn new(project_root: impl Into<std::path::PathBuf>) -> Self {
        let project_root = project_root.into();
        let context_dir = project_root.join(".ai-context");
        ProjectLayout {
            project_root,
            context_dir,
        }
    }

    /// Build the fully-wired [`FileLifecycleService`] for this layout.
    pub fn lifecycle_service(&self) -> FileLifecycleService {
        let repository = std::sync::Arc::new(JsonQueueRepository::new(&self.context_dir));
        let file_sync = FileSync::new(&self.context_dir);
        let context_writer = ContextWriter::new(&self.context_dir, &self.project_root);
        let config = WorkflowConfig::load(&self.project_root);
        let pattern_provider = self.pattern_provider();
        FileLifecycleService::new(repository, file_sync, context_writer, config, pattern_provider)
    }

    pub fn pattern_provider(&self) -> FilePatternProvider {
        FilePatternProvider::new(&self.project_root, &self.context_dir)
    }

    pub fn context_writer(&self) -> ContextWriter {
        ContextWriter::new(&self.context_dir, &self.project_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn layout_derives_context_dir() {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        assert_eq!(layout.context_dir, dir.path().join(".ai-context"));
    }
}
