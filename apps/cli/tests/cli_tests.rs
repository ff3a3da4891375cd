//! 命令行集成测试（不需要串口硬件）

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn cli(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("dynamixel-cli").unwrap();
    cmd.arg("--config").arg(config);
    cmd
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("dynamixel-cli")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ping"))
        .stdout(predicate::str::contains("move"))
        .stdout(predicate::str::contains("torque"));
}

#[test]
fn test_config_set_then_get() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    cli(&path)
        .args(["config", "set", "--port", "/dev/ttyUSB9", "--id", "5"])
        .assert()
        .success();

    cli(&path)
        .args(["config", "get", "port"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/dev/ttyUSB9"));

    cli(&path)
        .args(["config", "get", "id"])
        .assert()
        .success()
        .stdout(predicate::str::contains("5"));

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("port = \"/dev/ttyUSB9\""));
}

#[test]
fn test_config_path_prints_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");

    cli(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_get_unknown_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    cli(&dir.path().join("config.toml"))
        .args(["config", "get", "interface"])
        .assert()
        .failure();
}

#[test]
fn test_missing_port_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    cli(&dir.path().join("config.toml"))
        .arg("ping")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--port"));
}

#[test]
fn test_invalid_id_is_rejected_without_io() {
    let dir = tempfile::tempdir().unwrap();
    cli(&dir.path().join("config.toml"))
        .args(["--port", "/dev/does-not-exist", "--id", "254", "position"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_move_rejects_out_of_range_angle() {
    let dir = tempfile::tempdir().unwrap();
    cli(&dir.path().join("config.toml"))
        .args(["--port", "/dev/does-not-exist", "move", "360"])
        .assert()
        .failure();
}

#[test]
fn test_read_list_needs_no_port() {
    let dir = tempfile::tempdir().unwrap();
    cli(&dir.path().join("config.toml"))
        .args(["read", "--list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("present_position"))
        .stdout(predicate::str::contains("goal_position"));
}

#[test]
fn test_json_output_keeps_progress_off_stdout() {
    let dir = tempfile::tempdir().unwrap();
    cli(&dir.path().join("config.toml"))
        .args(["--port", "/dev/does-not-exist", "position", "--format", "json"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("/dev/does-not-exist"));
}
