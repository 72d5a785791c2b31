//! The in-memory registry of per-state checklist items and the gating rule
//! that blocks `transitionTo` until a state's required items are complete.

use std::collections::HashMap;

use crate::error::{IncompleteChecklistItem, Result, WorkflowError};
use crate::models::{ChecklistItemCompletion, Task, WorkflowState};
use crate::pattern::StateBasedPattern;

/// How important an item is: `required` items gate the transition,
/// everything else is advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecklistPriority {
    High,
    Medium,
    Low,
}

/// When an item applies beyond its default state membership. Modelled as
/// data (not a closure) so checklists stay serialisable and test-inspectable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecklistCondition {
    /// Always applicable wherever it's listed.
    Always,
    /// Only applicable if the task carries this tag.
    HasTag(String),
    /// Only applicable if the task carries any of these tags.
    AnyTag(Vec<String>),
}

impl ChecklistCondition {
    fn matches(&self, task: &Task) -> bool {
        match self {
            ChecklistCondition::Always => true,
            ChecklistCondition::HasTag(tag) => task.tags.iter().any(|t| t == tag),
            ChecklistCondition::AnyTag(tags) => {
                task.tags.iter().any(|t| tags.contains(t))
            }
        }
    }
}

/// A single item in a state's checklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub required: bool,
    pub priority: ChecklistPriority,
    pub applicable_states: Vec<WorkflowState>,
}

/// `ChecklistItem` paired with its applicability predicate. Kept separate
/// from `ChecklistItem` so the item itself stays trivially cloneable/eq.
pub struct ChecklistItemDef {
    pub item: ChecklistItem,
    pub condition: ChecklistCondition,
}

pub struct ChecklistRegistry {
    items: HashMap<WorkflowState, Vec<ChecklistItemDef>>,
}

impl Default for ChecklistRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ChecklistRegistry {
    /// The built-in registry described in spec §4.6.
    pub fn with_defaults() -> Self {
        use ChecklistPriority::*;
        use WorkflowState::*;

        let mut items: HashMap<WorkflowState, Vec<ChecklistItemDef>> = HashMap::new();

        let always = |id: &str, title: &str, description: &str, required: bool, priority, states: &[WorkflowState]| {
            ChecklistItemDef {
                item: ChecklistItem {
                    id: id.to_string(),
                    title: title.to_string(),
                    description: description.to_string(),
                    required,
                    priority,
                    applicable_states: states.to_vec(),
                },
                condition: ChecklistCondition::Always,
            }
        };

        items.insert(
            Understanding,
            vec![
                always(
                    "understand-requirements",
                    "Understand requirements",
                    "Read and internalize the task's stated goal and constraints.",
                    true,
                    High,
                    &[Understanding],
                ),
                always(
                    "identify-ambiguities",
                    "Identify ambiguities",
                    "Flag anything underspecified before committing to a design.",
                    true,
                    High,
                    &[Understanding],
                ),
                always(
                    "confirm-understanding",
                    "Confirm understanding",
                    "State back the interpreted goal in your own words.",
                    true,
                    Medium,
                    &[Understanding],
                ),
            ],
        );

        items.insert(
            Designing,
            vec![
                always(
                    "create-design-doc",
                    "Create design doc",
                    "Write down the approach before touching code.",
                    true,
                    High,
                    &[Designing],
                ),
                always(
                    "design-approval",
                    "Design approval",
                    "Get the design reviewed or self-approve against the goal.",
                    true,
                    High,
                    &[Designing],
                ),
                always(
                    "plan-implementation",
                    "Plan implementation",
                    "Break the design into an implementation order.",
                    false,
                    Low,
                    &[Designing],
                ),
            ],
        );

        items.insert(
            Implementing,
            vec![
                always(
                    "write-code",
                    "Write code",
                    "Implement the designed approach.",
                    true,
                    High,
                    &[Implementing],
                ),
                always(
                    "add-requirement-tags",
                    "Add requirement tags",
                    "Tag the task with the requirement identifiers it satisfies.",
                    true,
                    Medium,
                    &[Implementing],
                ),
                always(
                    "follow-patterns",
                    "Follow patterns",
                    "Apply the patterns relevant to this state.",
                    false,
                    Medium,
                    &[Implementing],
                ),
            ],
        );

        items.insert(
            Testing,
            vec![
                always(
                    "create-test-plan",
                    "Create test plan",
                    "Decide what needs coverage before writing tests.",
                    true,
                    High,
                    &[Testing],
                ),
                always(
                    "write-tests",
                    "Write tests",
                    "Write the planned tests.",
                    true,
                    High,
                    &[Testing],
                ),
                always(
                    "run-tests",
                    "Run tests",
                    "Execute the test suite and confirm it passes.",
                    true,
                    High,
                    &[Testing],
                ),
            ],
        );

        items.insert(
            Reviewing,
            vec![
                always(
                    "run-validation",
                    "Run validation",
                    "Run the validator and resolve any error-severity findings.",
                    true,
                    High,
                    &[Reviewing],
                ),
                always(
                    "code-quality-review",
                    "Code quality review",
                    "Review the diff for quality issues.",
                    true,
                    Medium,
                    &[Reviewing],
                ),
                always(
                    "requirements-verification",
                    "Requirements verification",
                    "Confirm every tagged requirement is satisfied.",
                    true,
                    High,
                    &[Reviewing],
                ),
            ],
        );

        items.insert(
            ReadyToCommit,
            vec![
                always(
                    "all-tests-passing",
                    "All tests passing",
                    "The full test suite passes.",
                    true,
                    High,
                    &[ReadyToCommit],
                ),
                always(
                    "validation-passed",
                    "Validation passed",
                    "The validator reports no blocking findings.",
                    true,
                    High,
                    &[ReadyToCommit],
                ),
                always(
                    "no-warnings",
                    "No warnings",
                    "No outstanding warning-severity findings.",
                    false,
                    Low,
                    &[ReadyToCommit],
                ),
            ],
        );

        ChecklistRegistry { items }
    }

    /// Items applicable to `state` for `task`, honoring each item's
    /// [`ChecklistCondition`]. Does not include pattern-derived items — see
    /// [`Self::items_for_with_patterns`] for the full materialisation used
    /// by `initializeStateChecklist` (spec §4.6).
    pub fn items_for(&self, state: WorkflowState, task: &Task) -> Vec<ChecklistItem> {
        self.items
            .get(&state)
            .into_iter()
            .flatten()
            .filter(|def| def.condition.matches(task))
            .map(|def| def.item.clone())
            .collect()
    }

    /// As [`Self::items_for`], but also folds in the `read`/`understand`/
    /// `implement` items the Pattern Provider contributes for every pattern
    /// relevant to `state`, per spec §4.7.
    pub fn items_for_with_patterns(
        &self,
        state: WorkflowState,
        task: &Task,
        patterns: &[StateBasedPattern],
    ) -> Vec<ChecklistItem> {
        let mut items = self.items_for(state, task);
        for pattern in patterns {
            items.extend(pattern.to_checklist_items(state));
        }
        items
    }

    /// `true` iff every required item applicable to `state` is completed on
    /// `task`. Ignores patterns — use [`Self::is_state_complete_with_patterns`]
    /// when the transition gate must also account for them.
    pub fn is_state_complete(&self, state: WorkflowState, task: &Task) -> bool {
        self.incomplete_required_items(state, task, &[]).is_empty()
    }

    /// As [`Self::is_state_complete`], folding in pattern-derived items.
    pub fn is_state_complete_with_patterns(
        &self,
        state: WorkflowState,
        task: &Task,
        patterns: &[StateBasedPattern],
    ) -> bool {
        self.incomplete_required_items(state, task, patterns).is_empty()
    }

    fn incomplete_required_items(
        &self,
        state: WorkflowState,
        task: &Task,
        patterns: &[StateBasedPattern],
    ) -> Vec<ChecklistItem> {
        let completions = task.state_checklists.get(state.as_str());
        self.items_for_with_patterns(state, task, patterns)
            .into_iter()
            .filter(|item| item.required)
            .filter(|item| {
                !completions
                    .and_then(|m| m.get(&item.id))
                    .map(|c| c.completed)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// The gating check behind `transitionTo`: fails with
    /// [`WorkflowError::StateChecklistIncomplete`] naming every incomplete
    /// required item unless the state's checklist is fully satisfied.
    pub fn require_state_complete(&self, state: WorkflowState, task: &Task) -> Result<()> {
        self.require_state_complete_with_patterns(state, task, &[])
    }

    /// As [`Self::require_state_complete`], folding in the checklist items
    /// the Pattern Provider contributes for `state` (spec §4.6/§4.7) so a
    /// mandatory, error-severity pattern can block the transition the same
    /// way a hard-coded required item does.
    pub fn require_state_complete_with_patterns(
        &self,
        state: WorkflowState,
        task: &Task,
        patterns: &[StateBasedPattern],
    ) -> Result<()> {
        let incomplete = self.incomplete_required_items(state, task, patterns);
        if incomplete.is_empty() {
            Ok(())
        } else {
            Err(WorkflowError::StateChecklistIncomplete {
                state,
                incomplete_items: incomplete
                    .into_iter()
                    .map(|i| IncompleteChecklistItem {
                        id: i.id,
                        title: i.title,
                        description: i.description,
                    })
                    .collect(),
            })
        }
    }

    /// Flip an item's completion flag and timestamp it, following
    /// `markItemComplete(itemId, notes?)`.
    pub fn mark_complete(
        &self,
        task: &mut Task,
        state: WorkflowState,
        item_id: &str,
        notes: Option<String>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        if !self.items_for(state, task).iter().any(|i| i.id == item_id) {
            return Err(WorkflowError::NotFound(format!(
                "checklist item '{item_id}' not applicable to {state}"
            )));
        }
        let state_map = task.state_checklists.entry(state.as_str().to_string()).or_default();
        let completion = state_map.entry(item_id.to_string()).or_default();
        completion.completed = true;
        completion.completed_at = Some(now);
        completion.notes = notes;
        Ok(())
    }
}
