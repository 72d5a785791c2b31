//! Loads `config/ai-workflow.config.json`, per spec §4.3/§6. The only key
//! consulted is `autoActions.task.complete.autoActivateNext`; everything
//! else in the file (if anything) is ignored. Absent file or key defaults
//! to `true`.

use std::path::PathBuf;

use config::{Config as ConfigBuilder, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    auto_actions: Option<RawAutoActions>,
    #[serde(rename = "autoActions", default)]
    auto_actions_camel: Option<RawAutoActions>,
    #[serde(rename = "archival", default)]
    archival: Option<RawArchival>,
}

#[derive(Debug, Deserialize, Default)]
struct RawAutoActions {
    task: Option<RawTaskActions>,
}

#[derive(Debug, Deserialize, Default)]
struct RawTaskActions {
    complete: Option<RawCompleteAction>,
}

#[derive(Debug, Deserialize, Default)]
struct RawCompleteAction {
    #[serde(rename = "autoActivateNext")]
    auto_activate_next: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct RawArchival {
    #[serde(rename = "horizonDays")]
    horizon_days: Option<i64>,
}

/// The subset of `config/ai-workflow.config.json` the core engine reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkflowConfig {
    pub auto_activate_next: bool,
    pub archive_horizon_days: i64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        WorkflowConfig {
            auto_activate_next: true,
            archive_horizon_days: 30,
        }
    }
}

impl WorkflowConfig {
    /// `project_root` is the directory containing `config/`.
    pub fn load(project_root: &std::path::Path) -> Self {
        let path: PathBuf = project_root.join("config/ai-workflow.config.json");
        if !path.exists() {
            return Self::default();
        }

        let builder = ConfigBuilder::builder().add_source(
            File::with_name(&path.to_string_lossy())
                .required(false)
                .format(FileFormat::Json),
        );

        let Ok(built) = builder.build() else {
            return Self::default();
        };
        let raw: RawConfig = built.try_deserialize().unwrap_or_default();

        let auto_activate_next = raw
            .auto_actions_camel
            .or(raw.auto_actions)
            .and_then(|a| a.task)
            .and_then(|t| t.complete)
            .and_then(|c| c.auto_activate_next)
            .unwrap_or(true);

        let archive_horizon_days = raw
            .archival
            .and_then(|a| a.horizon_days)
            .unwrap_or(30);

        WorkflowConfig {
            auto_activate_next,
            archive_horizon_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn absent_file_defaults_to_true() {
        let dir = tempdir().unwrap();
        let config = WorkflowConfig::load(dir.path());
        assert!(config.auto_activate_next);
        assert_eq!(config.archive_horizon_days, 30);
    }

    #[test]
    fn explicit_false_is_honoured() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(
            dir.path().join("config/ai-workflow.config.json"),
            r#"{"autoActions": {"task": {"complete": {"autoActivateNext": false}}}}"#,
        )
        .unwrap();
        let config = WorkflowConfig::load(dir.path());
        assert!(!config.auto_activate_next);
    }
}
