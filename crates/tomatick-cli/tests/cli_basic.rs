//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify outputs.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str], stdin: impl AsRef<[u8]>) -> (String, String, i32) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_tomatick"))
        .args(args)
        .env("TOMATICK_HOME", home)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute CLI command");

    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(stdin.as_ref())
        .expect("Failed to write stdin");

    let output = child.wait_with_output().expect("Failed to wait for CLI");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_ok(home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(home, args, "");
    assert_eq!(code, 0, "CLI command failed: {args:?}\n{stderr}");
    stdout
}

#[test]
fn test_config_list_shows_defaults() {
    let home = tempfile::tempdir().unwrap();
    let stdout = run_ok(home.path(), &["config", "list"]);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["timer"]["focus_minutes"], 25);
    assert_eq!(json["timer"]["long_break_interval"], 4);
    assert!(home.path().join("config.toml").exists());
}

#[test]
fn test_config_set_then_get() {
    let home = tempfile::tempdir().unwrap();
    run_ok(home.path(), &["config", "set", "timer.focus_minutes", "40"]);
    let stdout = run_ok(home.path(), &["config", "get", "timer.focus_minutes"]);
    assert_eq!(stdout.trim(), "40");
}

#[test]
fn test_config_set_clamps_invalid_interval() {
    let home = tempfile::tempdir().unwrap();
    let stdout = run_ok(home.path(), &["config", "set", "timer.long_break_interval", "0"]);
    assert_eq!(stdout.trim(), "timer.long_break_interval = 1");
}

#[test]
fn test_config_unknown_key_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["config", "get", "timer.nope"], "");
    assert_ne!(code, 0);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_history_starts_empty() {
    let home = tempfile::tempdir().unwrap();
    let stdout = run_ok(home.path(), &["history", "list", "--json"]);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json, serde_json::json!([]));

    let stdout = run_ok(home.path(), &["history", "stats"]);
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["total_sessions"], 0);
}

#[test]
fn test_history_delete_unknown_session_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(
        home.path(),
        &["history", "delete", "00000000-0000-4000-8000-000000000000"],
        "",
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("session not found"));
}

#[test]
fn test_run_reports_status_and_exits_on_quit() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) = run_cli(home.path(), &["run", "--quiet"], "status\nquit\n");
    assert_eq!(code, 0, "{stderr}");
    assert!(stdout.contains("Focus Time 25:00 (idle"));
}

#[test]
fn test_run_json_emits_command_events() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) = run_cli(
        home.path(),
        &["run", "--quiet", "--json"],
        "start\npause\nmode long_break\nquit\n",
    );
    assert_eq!(code, 0, "{stderr}");

    let kinds: Vec<String> = stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .filter_map(|v| v["type"].as_str().map(str::to_string))
        .collect();
    assert!(kinds.contains(&"timer_started".to_string()));
    assert!(kinds.contains(&"timer_paused".to_string()));
    assert!(kinds.contains(&"session_discarded".to_string()));
    assert!(kinds.contains(&"mode_changed".to_string()));

    // Nothing completed, so nothing was recorded.
    let stdout = run_ok(home.path(), &["history", "list", "--json"]);
    assert_eq!(stdout.trim(), "[]");
}

#[test]
fn test_run_set_persists_settings() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) = run_cli(
        home.path(),
        &["run", "--quiet"],
        "set focus_minutes 30\nstatus\nquit\n",
    );
    assert_eq!(code, 0, "{stderr}");
    assert!(stdout.contains("Focus Time 30:00"));

    let stdout = run_ok(home.path(), &["config", "get", "timer.focus_minutes"]);
    assert_eq!(stdout.trim(), "30");
}

#[test]
fn test_history_commands_do_not_write_config() {
    let home = tempfile::tempdir().unwrap();
    run_ok(home.path(), &["history", "list"]);
    run_ok(home.path(), &["history", "stats"]);
    assert!(!home.path().join("config.toml").exists());
}

#[test]
fn test_run_recovers_from_unreadable_history() {
    let home = tempfile::tempdir().unwrap();
    std::fs::write(home.path().join("tomatick.db"), b"\x00\x01garbage, not a database").unwrap();

    let (stdout, stderr, code) = run_cli(home.path(), &["run", "--quiet"], "status\nquit\n");
    assert_eq!(code, 0, "{stderr}");
    assert!(stdout.contains("Focus Time 25:00 (idle"));
    assert!(home.path().join("tomatick.db.corrupt").exists());

    let stdout = run_ok(home.path(), &["history", "list", "--json"]);
    assert_eq!(stdout.trim(), "[]");
}

#[test]
fn test_run_skips_invalid_utf8_and_still_saves() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) = run_cli(
        home.path(),
        &["run", "--quiet"],
        b"set focus_minutes 30\n\xff\xfe\nstatus\nquit\n",
    );
    assert_eq!(code, 0, "{stderr}");
    assert!(stderr.contains("not valid UTF-8"));
    assert!(stdout.contains("Focus Time 30:00"));

    let stdout = run_ok(home.path(), &["config", "get", "timer.focus_minutes"]);
    assert_eq!(stdout.trim(), "30");
}
