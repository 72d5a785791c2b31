//! Data model for state-scoped patterns and the trait their file-backed
//! provider implements. Loading and caching live in `store`; this module
//! only fixes the shape both sides agree on, mirroring the
//! trait-in-core/impl-in-store split used for [`crate::repository`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::checklist::{ChecklistItem, ChecklistPriority};
use crate::error::Result;
use crate::models::WorkflowState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    FileExists,
    CommandRun,
    CodeCheck,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternValidation {
    #[serde(rename = "type")]
    pub kind: ValidationKind,
    pub rule: String,
    pub message: String,
    pub severity: ValidationSeverity,
}

/// A convention the task should follow while in certain states, loaded
/// from `patterns.json` (or legacy `rules.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateBasedPattern {
    pub id: String,
    pub title: String,
    pub description: String,
    pub action: String,
    #[serde(rename = "applicableStates")]
    pub applicable_states: Vec<WorkflowState>,
    #[serde(rename = "requiredStates")]
    pub required_states: Vec<WorkflowState>,
    pub validation: PatternValidation,
}

impl StateBasedPattern {
    /// Relevant in `state` iff it appears in either applicable or required.
    pub fn is_relevant_in(&self, state: WorkflowState) -> bool {
        self.applicable_states.contains(&state) || self.required_states.contains(&state)
    }

    /// Mandatory in `state` iff it appears in `requiredStates`.
    pub fn is_mandatory_in(&self, state: WorkflowState) -> bool {
        self.required_states.contains(&state)
    }

    /// Expands this pattern into the `read` → `understand` → `implement`
    /// checklist triad described in spec §4.7, scoped to `state`. Returns
    /// nothing if the pattern isn't relevant in `state`.
    ///
    /// Only the `implement` step can gate a transition, and only when the
    /// pattern is both `required` in `state` and `error`-severity — the same
    /// severity rule `validate` applies, so a state can never be blocked by
    /// a pattern that `validate` itself would treat as non-blocking.
    pub fn to_checklist_items(&self, state: WorkflowState) -> Vec<ChecklistItem> {
        if !self.is_relevant_in(state) {
            return Vec::new();
        }
        let mandatory = self.is_mandatory_in(state);
        let implement_required = mandatory && self.validation.severity == ValidationSeverity::Error;
        let implement_priority = if implement_required {
            ChecklistPriority::High
        } else if mandatory {
            ChecklistPriority::Medium
        } else {
            ChecklistPriority::Low
        };
        let verified_by = match self.validation.kind {
            ValidationKind::FileExists => format!("file check: {}", self.validation.rule),
            ValidationKind::CommandRun => format!("command: {}", self.validation.rule),
            ValidationKind::CodeCheck => format!("code check: {}", self.validation.rule),
            ValidationKind::Custom => "manual verification".to_string(),
        };

        vec![
            ChecklistItem {
                id: format!("pattern-{}-read", self.id),
                title: format!("Read: {}", self.title),
                description: self.description.clone(),
                required: false,
                priority: ChecklistPriority::Low,
                applicable_states: vec![state],
            },
            ChecklistItem {
                id: format!("pattern-{}-understand", self.id),
                title: format!("Understand: {}", self.title),
                description: format!("Understand how this applies here: {}", self.action),
                required: false,
                priority: ChecklistPriority::Low,
                applicable_states: vec![state],
            },
            ChecklistItem {
                id: format!("pattern-{}-implement", self.id),
                title: format!("Implement: {}", self.title),
                description: format!("{} (verified by {verified_by})", self.action),
                required: implement_required,
                priority: implement_priority,
                applicable_states: vec![state],
            },
        ]
    }
}

/// Outcome of verifying one pattern's `validation` rule against the
/// current project state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternVerification {
    pub pattern_id: String,
    pub passed: bool,
    pub severity: ValidationSeverity,
    pub message: String,
}

/// File-backed lookup of patterns, with the 5-minute verification cache
/// described in spec §4.7. Implemented in `store` (file IO belongs there);
/// `core` fixes only the contract.
#[async_trait]
pub trait PatternProvider: Send + Sync {
    /// All patterns relevant (applicable or required) to `state`.
    async fn patterns_for_state(&self, state: WorkflowState) -> Result<Vec<StateBasedPattern>>;

    /// The subset of `patterns_for_state` that is mandatory in `state`.
    async fn mandatory_patterns_for_state(
        &self,
        state: WorkflowState,
    ) -> Result<Vec<StateBasedPattern>>;

    /// Verify a single pattern's rule, using the memoised result if still
    /// fresh (file mtime unchanged, under 5 minutes old).
    async fn verify_pattern(&self, pattern_id: &str) -> Result<PatternVerification>;
}
