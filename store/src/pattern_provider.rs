//! File-backed [`PatternProvider`], loading `patterns.json` (or the legacy
//! `rules.json` when only that exists) and memoising verification results
//! for 5 minutes, invalidated on the source file's mtime changing, per
//! spec §4.7.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::Mutex;
use workflow_core::error::Result;
use workflow_core::models::WorkflowState;
use workflow_core::pattern::{PatternProvider, PatternVerification, StateBasedPattern, ValidationKind};

const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    verification: PatternVerification,
    cached_at: SystemTime,
    source_mtime: Option<SystemTime>,
}

pub struct FilePatternProvider {
    project_root: PathBuf,
    patterns_path: PathBuf,
    legacy_rules_path: PathBuf,
    cache: Mutex<std::collections::HashMap<String, CacheEntry>>,
}

impl FilePatternProvider {
    pub fn new(project_root: impl Into<PathBuf>, context_dir: impl Into<PathBuf>) -> Self {
        let context_dir = context_dir.into();
        FilePatternProvider {
            project_root: project_root.into(),
            patterns_path: context_dir.join("patterns.json"),
            legacy_rules_path: context_dir.join("rules.json"),
            cache: Mutex::new(std::collections::HashMap::new()),
        }
    }

    fn source_path(&self) -> &Path {
        if self.patterns_path.exists() {
            &self.patterns_path
        } else {
            &self.legacy_rules_path
        }
    }

    async fn load_all(&self) -> Result<Vec<StateBasedPattern>> {
        let path = self.source_path().to_path_buf();
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn source_mtime(&self) -> Option<SystemTime> {
        tokio::fs::metadata(self.source_path())
            .await
            .ok()
            .and_then(|m| m.modified().ok())
    }

    fn verify_rule(&self, pattern: &StateBasedPattern) -> PatternVerification {
        let severity = pattern.validation.severity;
        match pattern.validation.kind {
            ValidationKind::FileExists => {
                let exists = self.project_root.join(&pattern.validation.rule).exists();
                PatternVerification {
                    pattern_id: pattern.id.clone(),
                    passed: exists,
                    severity,
                    message: if exists {
                        format!("{} exists", pattern.validation.rule)
                    } else {
                        pattern.validation.message.clone()
                    },
                }
            }
            ValidationKind::CommandRun => {
                let status = std::process::Command::new("sh")
                    .arg("-c")
                    .arg(&pattern.validation.rule)
                    .current_dir(&self.project_root)
                    .status();
                let passed = status.map(|s| s.success()).unwrap_or(false);
                PatternVerification {
                    pattern_id: pattern.id.clone(),
                    passed,
                    severity,
                    message: if passed {
                        "command exited successfully".to_string()
                    } else {
                        pattern.validation.message.clone()
                    },
                }
            }
            ValidationKind::CodeCheck => {
                // Non-blocking per spec §4.5 unless severity says otherwise;
                // a rule of the form "<path>::<needle>" is checked as a
                // textual containment test, anything else is reported
                // unverified rather than guessed at.
                let passed = match pattern.validation.rule.split_once("::") {
                    Some((path, needle)) => std::fs::read_to_string(self.project_root.join(path))
                        .map(|contents| contents.contains(needle))
                        .unwrap_or(false),
                    None => false,
                };
                PatternVerification {
                    pattern_id: pattern.id.clone(),
                    passed,
                    severity,
                    message: if passed {
                        "textual check satisfied".to_string()
                    } else {
                        pattern.validation.message.clone()
                    },
                }
            }
            ValidationKind::Custom => PatternVerification {
                pattern_id: pattern.id.clone(),
                passed: false,
                severity,
                message: "custom validations require manual verification".to_string(),
            },
        }
    }
}

#[async_trait::async_trait]
impl PatternProvider for FilePatternProvider {
    async fn patterns_for_state(&self, state: WorkflowState) -> Result<Vec<StateBasedPattern>> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .filter(|p| p.is_relevant_in(state))
            .collect())
    }

    async fn mandatory_patterns_for_state(
        &self,
        state: WorkflowState,
    ) -> Result<Vec<StateBasedPattern>> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .filter(|p| p.is_mandatory_in(state))
            .collect())
    }

    async fn verify_pattern(&self, pattern_id: &str) -> Result<PatternVerification> {
        let mtime = self.source_mtime().await;
        {
            let cache = self.cache.lock().await;
            if let Some(entry) = cache.get(pattern_id) {
                let fresh = entry.cached_at.elapsed().map(|e| e < CACHE_TTL).unwrap_or(false);
                if fresh && entry.source_mtime == mtime {
                    return Ok(entry.verification.clone());
                }
            }
        }

        let patterns = self.load_all().await?;
        let pattern = patterns
            .into_iter()
            .find(|p| p.id == pattern_id)
            .ok_or_else(|| {
                workflow_core::error::WorkflowError::NotFound(format!(
                    "pattern '{pattern_id}' not found"
                ))
            })?;
        let verification = self.verify_rule(&pattern);

        let mut cache = self.cache.lock().await;
        cache.insert(
            pattern_id.to_string(),
            CacheEntry {
                verification: verification.clone(),
                cached_at: SystemTime::now(),
                source_mtime: mtime,
            },
        );
        Ok(verification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use workflow_core::pattern::{PatternValidation, ValidationSeverity};

    fn sample_pattern(id: &str, kind: ValidationKind, rule: &str) -> StateBasedPattern {
        StateBasedPattern {
            id: id.to_string(),
            title: "Sample".into(),
            description: "desc".into(),
            action: "do it".into(),
            applicable_states: vec![WorkflowState::Implementing],
            required_states: vec![],
            validation: PatternValidation {
                kind,
                rule: rule.to_string(),
                message: "failed".into(),
                severity: ValidationSeverity::Warning,
            },
        }
    }

    #[tokio::test]
    async fn file_exists_pattern_checked_against_project_root() {
        let project = tempdir().unwrap();
        let context = tempdir().unwrap();
        tokio::fs::write(project.path().join("README.md"), b"hi")
            .await
            .unwrap();
        let patterns = vec![sample_pattern("p1", ValidationKind::FileExists, "README.md")];
        tokio::fs::write(
            context.path().join("patterns.json"),
            serde_json::to_vec(&patterns).unwrap(),
        )
        .await
        .unwrap();

        let provider = FilePatternProvider::new(project.path(), context.path());
        let result = provider.verify_pattern("p1").await.unwrap();
        assert!(result.passed);
    }

    #[tokio::test]
    async fn unknown_pattern_id_errors() {
        let project = tempdir().unwrap();
        let context = tempdir().unwrap();
        let provider = FilePatternProvider::new(project.path(), context.path());
        assert!(provider.verify_pattern("nope").await.is_err());
    }

    #[tokio::test]
    async fn relevance_filters_by_state() {
        let project = tempdir().unwrap();
        let context = tempdir().unwrap();
        let patterns = vec![sample_pattern("p1", ValidationKind::FileExists, "x")];
        tokio::fs::write(
            context.path().join("patterns.json"),
            serde_json::to_vec(&patterns).unwrap(),
        )
        .await
        .unwrap();
        let provider = FilePatternProvider::new(project.path(), context.path());
        assert_eq!(
            provider
                .patterns_for_state(WorkflowState::Implementing)
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            provider
                .patterns_for_state(WorkflowState::Testing)
                .await
                .unwrap()
                .len(),
            0
        );
    }
}
