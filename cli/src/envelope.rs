//! The `{status, data, nextActions, error?, exitCode?}` JSON envelope every
//! CLI command renders, per spec §6.2. Commands build an [`Envelope`]; only
//! `main.rs` decides whether to render it as JSON or plain `{:#?}` debug.

use serde::Serialize;
use serde_json::Value;
use workflow_core::error::WorkflowError;

/// One entry of `nextActions`, per spec §6.2's
/// `{type, action, reason, required?}` shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextAction {
    #[serde(rename = "type")]
    pub kind: NextActionKind,
    pub action: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextActionKind {
    Command,
    ReadFile,
    CheckState,
}

impl NextAction {
    pub fn command(action: impl Into<String>, reason: impl Into<String>) -> Self {
        NextAction {
            kind: NextActionKind::Command,
            action: action.into(),
            reason: reason.into(),
            required: None,
        }
    }

    pub fn required_command(action: impl Into<String>, reason: impl Into<String>) -> Self {
        NextAction {
            kind: NextActionKind::Command,
            action: action.into(),
            reason: reason.into(),
            required: Some(true),
        }
    }

    pub fn check_state(action: impl Into<String>, reason: impl Into<String>) -> Self {
        NextAction {
            kind: NextActionKind::CheckState,
            action: action.into(),
            reason: reason.into(),
            required: None,
        }
    }

    pub fn read_file(action: impl Into<String>, reason: impl Into<String>) -> Self {
        NextAction {
            kind: NextActionKind::ReadFile,
            action: action.into(),
            reason: reason.into(),
            required: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub status: &'static str,
    pub data: Value,
    pub next_actions: Vec<NextAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl Envelope {
    pub fn ok(data: Value, next_actions: Vec<NextAction>) -> Self {
        Envelope {
            status: "success",
            data,
            next_actions,
            error: None,
            exit_code: None,
        }
    }

    pub fn error(err: &WorkflowError) -> Self {
        Envelope {
            status: "error",
            data: Value::Null,
            next_actions: Vec::new(),
            error: Some(err.to_string()),
            exit_code: Some(err.exit_code()),
        }
    }

    /// `status:error` reported in the JSON body without failing the
    /// process — `task status` with no active task per spec §6 ("exit 0
    /// ... with status:error in JSON").
    pub fn soft_error(message: impl Into<String>, next_actions: Vec<NextAction>) -> Self {
        Envelope {
            status: "error",
            data: Value::Null,
            next_actions,
            error: Some(message.into()),
            exit_code: Some(0),
        }
    }

    /// `validate`'s result envelope: the `data` payload (carrying
    /// `overall`/`results`) is reported either way, but the process exit
    /// code follows `overall` per spec §6 (`validate → 0 iff overall
    /// true; 1 otherwise`) regardless of whether the result came from a
    /// fresh run or `--use-cache`.
    pub fn validation_result(overall: bool, data: Value, next_actions: Vec<NextAction>) -> Self {
        Envelope {
            status: if overall { "success" } else { "error" },
            data,
            next_actions,
            error: if overall {
                None
            } else {
                Some("validation failed".to_string())
            },
            exit_code: Some(if overall { 0 } else { 1 }),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code.unwrap_or(0)
    }
}
