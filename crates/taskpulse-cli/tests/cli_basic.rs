//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run and verify outputs. They run
//! against the dev data directory (TASKPULSE_ENV=dev).

use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-p", "taskpulse-cli", "--"])
        .args(args)
        .env("TASKPULSE_ENV", "dev")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

#[test]
fn test_task_add() {
    let (stdout, _, code) = run_cli(&["task", "add", "Test Task"]);
    assert_eq!(code, 0, "Task add failed");
    assert!(stdout.contains("Task created:"));
}

#[test]
fn test_task_list() {
    let (stdout, _, code) = run_cli(&["task", "list"]);
    assert_eq!(code, 0, "Task list failed");
    assert!(serde_json::from_str::<serde_json::Value>(&stdout).is_ok());
}

#[test]
fn test_task_set_status() {
    let (stdout, _, code) = run_cli(&["task", "add", "Status Test"]);
    assert_eq!(code, 0);
    let id = stdout
        .lines()
        .next()
        .and_then(|l| l.strip_prefix("Task created: "))
        .expect("no task id in output")
        .to_string();

    let (_, _, code) = run_cli(&["task", "set-status", &id, "in_progress"]);
    assert_eq!(code, 0, "Task set-status failed");

    let (_, stderr, code) = run_cli(&["task", "set-status", &id, "bogus"]);
    assert_ne!(code, 0, "Bogus status accepted");
    assert!(stderr.contains("unknown task status"));
}

#[test]
fn test_session_lifecycle() {
    let (stdout, _, code) = run_cli(&["task", "add", "Session Test"]);
    assert_eq!(code, 0);
    let task_id = stdout
        .lines()
        .next()
        .and_then(|l| l.strip_prefix("Task created: "))
        .expect("no task id in output")
        .to_string();

    let (stdout, _, code) = run_cli(&["session", "start", &task_id]);
    assert_eq!(code, 0, "Session start failed");
    let session_id = stdout
        .lines()
        .next()
        .and_then(|l| l.strip_prefix("Session started: "))
        .expect("no session id in output")
        .to_string();

    let (stdout, _, code) = run_cli(&["session", "stop", &session_id, "--score", "8"]);
    assert_eq!(code, 0, "Session stop failed");
    assert!(stdout.contains("Session stopped"));
}

#[test]
fn test_session_stop_rejects_out_of_range_score() {
    let (_, stderr, code) = run_cli(&["session", "stop", "whatever", "--score", "11"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("0-10"));
}

#[test]
fn test_score_rank() {
    let _ = run_cli(&["task", "add", "Rank Me"]);
    let (stdout, _, code) = run_cli(&["score", "rank"]);
    assert_eq!(code, 0, "Score rank failed");
    let ranked: serde_json::Value = serde_json::from_str(&stdout).expect("rank output not JSON");
    let entries = ranked.as_array().expect("expected array");
    assert!(!entries.is_empty());
    let first = &entries[0];
    assert!(first["score"].as_u64().unwrap() <= 100);
    assert!(first["reasons"].as_array().unwrap().len() <= 3);
}

#[test]
fn test_score_context() {
    let (stdout, _, code) = run_cli(&["score", "context"]);
    assert_eq!(code, 0, "Score context failed");
    let ctx: serde_json::Value = serde_json::from_str(&stdout).expect("context output not JSON");
    assert!(ctx["current_hour"].as_u64().unwrap() < 24);
}

#[test]
fn test_trigger_list() {
    let (stdout, _, code) = run_cli(&["trigger", "list"]);
    assert_eq!(code, 0, "Trigger list failed");
    assert!(stdout.contains("stale-tasks"));
    assert!(stdout.contains("productivity-peak"));
}

#[test]
fn test_trigger_check() {
    let (stdout, _, code) = run_cli(&["trigger", "check"]);
    assert_eq!(code, 0, "Trigger check failed");
    assert!(stdout.contains("checks"));
}

#[test]
fn test_notify_history() {
    let (_, _, code) = run_cli(&["notify", "history"]);
    assert_eq!(code, 0, "Notify history failed");
}

#[test]
fn test_config_get() {
    let (stdout, _, code) = run_cli(&["config", "get", "notifier.quiet_hours_start"]);
    assert_eq!(code, 0, "Config get failed");
    assert!(!stdout.trim().is_empty());
}

#[test]
fn test_config_get_unknown_key() {
    let (_, stderr, code) = run_cli(&["config", "get", "notifier.nope"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_config_set_and_reset() {
    let (stdout, _, code) = run_cli(&["config", "set", "notifier.max_notifications_per_hour", "4"]);
    assert_eq!(code, 0, "Config set failed");
    assert!(stdout.contains("ok"));

    let (stdout, _, code) = run_cli(&["config", "get", "notifier.max_notifications_per_hour"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "4");

    // Out-of-range values are rejected.
    let (_, _, code) = run_cli(&["config", "set", "notifier.quiet_hours_start", "24"]);
    assert_ne!(code, 0, "Invalid hour accepted");

    let (_, _, code) = run_cli(&["config", "reset"]);
    assert_eq!(code, 0, "Config reset failed");
}

#[test]
fn test_config_list() {
    let (stdout, _, code) = run_cli(&["config", "list"]);
    assert_eq!(code, 0, "Config list failed");
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("config list not JSON");
    assert!(json["notifier"].is_object());
    assert!(json["scheduler"].is_object());
}
