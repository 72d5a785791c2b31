//! Black-box end-to-end scenarios driving the compiled `ai-workflow` binary
//! over its process boundary, the way the teacher's `minimal_test.rs` and
//! `manual_tests.rs` drive a freshly spawned server binary, but here via
//! `assert_cmd` against stdout/exit code instead of an RMCP transport.
//!
//! Each scenario gets its own `tempfile::tempdir()` project root so runs
//! never share state.

use assert_cmd::Command;
use serde_json::Value;
use std::path::Path;

fn ai_workflow(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ai-workflow").expect("ai-workflow binary should build");
    cmd.arg("--project-root").arg(root).arg("--json").arg("--silent");
    cmd
}

fn run_json(root: &Path, args: &[&str]) -> (Value, i32) {
    let mut cmd = ai_workflow(root);
    cmd.args(args);
    let output = cmd.output().expect("ai-workflow should spawn");
    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: Value = serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("expected JSON envelope, got {stdout:?}: {e}"));
    (parsed, code)
}

/// Scenario 1: fresh project, single task.
#[test]
fn fresh_project_single_task() {
    let dir = tempfile::tempdir().unwrap();
    let (envelope, code) = run_json(
        dir.path(),
        &["task", "create", "Implement user authentication flow"],
    );
    assert_eq!(code, 0);
    assert_eq!(envelope["status"], "success");
    assert_eq!(envelope["data"]["status"], "ACTIVE");
    assert_eq!(envelope["data"]["priority"], "MEDIUM");
    assert_eq!(envelope["data"]["workflow"]["currentState"], "UNDERSTANDING");

    let context_dir = dir.path().join(".ai-context");
    assert!(context_dir.join("STATUS.txt").exists());
    let legacy: Value = serde_json::from_str(
        &std::fs::read_to_string(context_dir.join("current-task.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(legacy["originalGoal"], "Implement user authentication flow");
}

/// Scenario 3: an illegal transition is rejected and names both states.
#[test]
fn illegal_transition_is_blocked() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["task", "create", "Add rate limiting to the public API"]);

    let (envelope, code) = run_json(dir.path(), &["sync", "--state", "IMPLEMENTING"]);
    assert_ne!(code, 0);
    assert_eq!(envelope["status"], "error");
    let message = envelope["error"].as_str().unwrap();
    assert!(message.contains("UNDERSTANDING"));
    assert!(message.contains("IMPLEMENTING"));
}

/// Scenario 4: the checklist gate blocks progression until its required
/// items are complete, and the task's state does not move.
#[test]
fn checklist_gate_blocks_progression() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["task", "create", "Introduce a connection pool for the database client"]);

    let (envelope, code) = run_json(dir.path(), &["sync", "--state", "DESIGNING"]);
    assert_ne!(code, 0);
    assert_eq!(envelope["status"], "error");

    let (status, _) = run_json(dir.path(), &["task", "status"]);
    assert_eq!(status["data"]["workflow"]["currentState"], "UNDERSTANDING");
}

/// Scenario 5: a manually corrupted legacy file is detected as history
/// corruption on the next lifecycle call.
#[test]
fn history_corruption_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["task", "create", "Rewrite the session renewal logic"]);

    let legacy_path = dir.path().join(".ai-context/current-task.json");
    let mut legacy: Value =
        serde_json::from_str(&std::fs::read_to_string(&legacy_path).unwrap()).unwrap();
    legacy["workflow"]["currentState"] = Value::from("DESIGNING");
    legacy["workflow"]["stateHistory"] = serde_json::json!([
        { "state": "DESIGNING", "enteredAt": legacy["workflow"]["stateEnteredAt"] }
    ]);
    std::fs::write(&legacy_path, serde_json::to_string_pretty(&legacy).unwrap()).unwrap();

    let (envelope, code) = run_json(dir.path(), &["sync", "--state", "IMPLEMENTING"]);
    assert_ne!(code, 0);
    assert_eq!(envelope["status"], "error");
    let message = envelope["error"].as_str().unwrap();
    assert!(message.contains("Current state found in history"));
}

/// Scenario 6: disabling auto-activation in config leaves the queued
/// successor queued; the CLI override re-enables it for one call.
#[test]
fn auto_activation_config_is_honoured() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("config")).unwrap();
    std::fs::write(
        dir.path().join("config/ai-workflow.config.json"),
        r#"{"autoActions": {"task": {"complete": {"autoActivateNext": false}}}}"#,
    )
    .unwrap();

    let (first, _) = run_json(dir.path(), &["task", "create", "Ship the first deliverable"]);
    let first_id = first["data"]["id"].as_str().unwrap().to_string();
    run_json(dir.path(), &["task", "create", "Queued successor work item"]);

    for state in ["DESIGNING", "IMPLEMENTING", "TESTING", "REVIEWING", "READY_TO_COMMIT"] {
        complete_checklist_and_sync(dir.path(), &first_id, state);
    }

    let (completed, code) = run_json(dir.path(), &["task", "complete"]);
    assert_eq!(code, 0);
    assert!(completed["data"]["nextActive"].is_null());

    let (status, _) = run_json(dir.path(), &["task", "status"]);
    assert!(status["data"].is_null());
}

/// Marks every required checklist item for the state the task is leaving
/// complete (by editing `tasks.json` directly, the only way to do so
/// without a dedicated CLI verb for the state-wide checklist) and then
/// syncs into `state`.
fn complete_checklist_and_sync(root: &Path, task_id: &str, state: &str) {
    let queue_path = root.join(".ai-context/tasks.json");
    let mut queue: Value =
        serde_json::from_str(&std::fs::read_to_string(&queue_path).unwrap()).unwrap();
    let tasks = queue["tasks"].as_array_mut().unwrap();
    let task = tasks.iter_mut().find(|t| t["id"] == task_id).unwrap();
    let current_state = task["workflow"]["currentState"].as_str().unwrap().to_string();
    let required = required_items_for(&current_state);
    let checklists = task["stateChecklists"].as_object_mut().unwrap();
    let entry = checklists
        .entry(current_state.clone())
        .or_insert_with(|| serde_json::json!({}))
        .as_object_mut()
        .unwrap();
    for item_id in required {
        entry.insert(
            item_id.to_string(),
            serde_json::json!({ "completed": true, "completedAt": null, "notes": null }),
        );
    }
    std::fs::write(&queue_path, serde_json::to_string_pretty(&queue).unwrap()).unwrap();

    run_json(root, &["sync", "--state", state]);
}

fn required_items_for(state: &str) -> &'static [&'static str] {
    match state {
        "UNDERSTANDING" => &["understand-requirements", "identify-ambiguities", "confirm-understanding"],
        "DESIGNING" => &["create-design-doc", "design-approval"],
        "IMPLEMENTING" => &["write-code", "add-requirement-tags"],
        "TESTING" => &["create-test-plan", "write-tests", "run-tests"],
        "REVIEWING" => &["run-validation", "code-quality-review", "requirements-verification"],
        "READY_TO_COMMIT" => &["all-tests-passing", "validation-passed"],
        _ => &[],
    }
}
