//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against a throwaway HOME so the store
//! and config file start empty.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(home: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_quitbox"))
        .args(args)
        .env("HOME", home)
        .env("QUITBOX_LOG", "warn")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn run_json(home: &Path, args: &[&str]) -> serde_json::Value {
    let (code, stdout, stderr) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_fresh_status_is_unlocked() {
    let home = TempDir::new().unwrap();
    let status = run_json(home.path(), &["status"]);
    assert_eq!(status["boxState"], 1);
    assert_eq!(status["timerMode"], 0);
    assert_eq!(status["emergencyCount"], 0);
}

#[test]
fn test_lock_persists_between_invocations() {
    let home = TempDir::new().unwrap();
    let locked = run_json(home.path(), &["lock"]);
    assert_eq!(locked["success"], true);

    let status = run_json(home.path(), &["status"]);
    assert_eq!(status["boxState"], 0);
    assert_eq!(status["timerActive"], true);
    assert!(status["timeRemainingSeconds"].as_u64().unwrap() > 29 * 60);
}

#[test]
fn test_emergency_adds_penalty() {
    let home = TempDir::new().unwrap();
    run_json(home.path(), &["lock"]);
    let grant = run_json(home.path(), &["emergency"]);
    assert_eq!(grant["success"], true);
    assert_eq!(grant["penalty"], 15);

    let config = run_json(home.path(), &["timer", "show"]);
    assert_eq!(config["intervalMinutes"], 45);
}

#[test]
fn test_emergency_while_unlocked_fails() {
    let home = TempDir::new().unwrap();
    let (code, stdout, stderr) = run_cli(home.path(), &["emergency"]);
    assert_eq!(code, 1);
    assert!(stdout.contains("already_unlocked"));
    assert!(stderr.contains("error:"));
}

#[test]
fn test_invalid_interval_is_rejected() {
    let home = TempDir::new().unwrap();
    let (code, _, stderr) = run_cli(home.path(), &["timer", "set", "--interval", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("interval_minutes"));
}

#[test]
fn test_daily_schedule_roundtrip() {
    let home = TempDir::new().unwrap();
    let config = run_json(home.path(), &["schedule", "daily", "22", "15", "--duration", "20"]);
    assert_eq!(config["timerMode"], 4);
    assert_eq!(config["schedule"]["hour"], 22);
    assert_eq!(config["schedule"]["minute"], 15);
    assert_eq!(config["schedule"]["unlockDurationMinutes"], 20);

    let shown = run_json(home.path(), &["schedule", "show"]);
    assert!(shown["nextUnlockSeconds"].as_u64().is_some());
}

#[test]
fn test_settings_set_and_list() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["settings", "set", "currency", "USD"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "ok");

    let settings = run_json(home.path(), &["settings", "list"]);
    assert_eq!(settings["cost"]["currency"], "USD");

    let (code, _, _) = run_cli(home.path(), &["settings", "set", "servo_locked_pos", "200"]);
    assert_eq!(code, 1);
}

#[test]
fn test_servo_calibration() {
    let home = TempDir::new().unwrap();
    let settings = run_json(home.path(), &["settings", "servo", "--locked", "10", "--unlocked", "100"]);
    assert_eq!(settings["servo"]["lockedAngle"], 10);
    assert_eq!(settings["servo"]["unlockedAngle"], 100);

    let (code, _, _) = run_cli(home.path(), &["settings", "servo", "--locked", "181"]);
    assert_ne!(code, 0);
    let settings = run_json(home.path(), &["settings", "list"]);
    assert_eq!(settings["servo"]["lockedAngle"], 10);
}

#[test]
fn test_network_lists_survive_invocations() {
    let home = TempDir::new().unwrap();
    run_json(
        home.path(),
        &["settings", "networks", "--allow", "home", "--block", "Cafe Free", "--block-public", "false"],
    );
    let settings = run_json(home.path(), &["settings", "list"]);
    assert_eq!(settings["network"]["allowedNetworks"], serde_json::json!(["home"]));
    assert_eq!(settings["network"]["blockedNetworks"], serde_json::json!(["Cafe Free"]));
    assert_eq!(settings["network"]["blockOnPublic"], false);

    run_json(home.path(), &["settings", "networks", "--clear"]);
    let settings = run_json(home.path(), &["settings", "list"]);
    assert_eq!(settings["network"]["allowedNetworks"], serde_json::json!([]));
}

#[test]
fn test_host_config_network_and_device() {
    let home = TempDir::new().unwrap();
    let config = run_json(home.path(), &["config", "network", "--ssid", "home"]);
    assert_eq!(config["network"]["ssid"], "home");
    assert_eq!(config["network"]["ap_mode"], false);

    let config = run_json(
        home.path(),
        &["config", "device", "--utc-offset", "-300", "--emergency-reset", "calendar"],
    );
    assert_eq!(config["device"]["utc_offset_minutes"], -300);
    assert_eq!(config["device"]["emergency_reset"], "calendar");

    let (code, stdout, _) = run_cli(home.path(), &["config", "get", "network.ssid"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "home");

    let (code, _, _) = run_cli(home.path(), &["config", "device", "--tick-ms", "0"]);
    assert_ne!(code, 0);
    let (code, _, _) = run_cli(home.path(), &["config", "network", "--ssid", "x", "--ap"]);
    assert_ne!(code, 0);
}

#[test]
fn test_reset_requires_confirmation() {
    let home = TempDir::new().unwrap();
    run_json(home.path(), &["lock"]);
    let (code, _, _) = run_cli(home.path(), &["reset"]);
    assert_eq!(code, 1);

    let reset = run_json(home.path(), &["reset", "--yes"]);
    assert_eq!(reset["success"], true);
    let status = run_json(home.path(), &["status"]);
    assert_eq!(status["boxState"], 1);
}
