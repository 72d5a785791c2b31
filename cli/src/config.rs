use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, File, FileFormat};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Absent in most projects' `ai-workflow.config.json` (only
    /// `autoActions.task.complete.autoActivateNext` is load-bearing per
    /// spec §6.3) — defaults rather than failing to deserialize when the
    /// file carries only that key.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Root of the project the queue/context live under. Never read from
    /// `config/ai-workflow.config.json` — always supplied by the CLI (`--project-root`
    /// or the current directory) and merged in after the file is loaded.
    #[serde(skip)]
    pub project_root: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (pretty, json, compact)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl Config {
    /// Load `project_root/config/ai-workflow.config.json` if present,
    /// defaulting everything absent, then fix `project_root` to `root`.
    pub fn load(project_root: impl Into<PathBuf>) -> Result<Self> {
        let project_root = project_root.into();
        let path = project_root.join("config/ai-workflow.config.json");

        let mut config = if path.exists() {
            let builder = ConfigBuilder::builder().add_source(
                File::with_name(&path.to_string_lossy())
                    .required(false)
                    .format(FileFormat::Json),
            );
            let built = builder.build().context("failed to build configuration")?;
            built
                .try_deserialize()
                .context("failed to deserialize configuration")?
        } else {
            Self::default()
        };

        config.project_root = project_root;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(anyhow::anyhow!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                ));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
            project_root: PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        let mut invalid_config = Config::default();
        invalid_config.logging.level = "invalid".to_string();
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_load_without_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.project_root, dir.path());
    }

    #[test]
    fn test_load_reads_logging_section() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(
            dir.path().join("config/ai-workflow.config.json"),
            r#"{"logging": {"level": "debug", "format": "json"}}"#,
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_config_with_only_auto_actions_section() {
        // The common real-world shape (spec §4.3): a project's config file
        // carries only `autoActions`, never `logging`.
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(
            dir.path().join("config/ai-workflow.config.json"),
            r#"{"autoActions": {"task": {"complete": {"autoActivateNext": false}}}}"#,
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.logging.level, "info");
    }
}
