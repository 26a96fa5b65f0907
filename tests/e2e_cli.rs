//! CLI end-to-end tests
//!
//! Tests for the clipshrink command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the clipshrink binary
#[allow(deprecated)]
fn clipshrink_cmd() -> Command {
    Command::cargo_bin("clipshrink").unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = clipshrink_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = clipshrink_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("clipshrink"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_flag() {
    let mut cmd = clipshrink_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("clipshrink"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = clipshrink_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_check_tools_command() {
    let mut cmd = clipshrink_cmd();
    cmd.arg("check-tools").assert().success().stdout(
        predicate::str::contains("ffmpeg")
            .or(predicate::str::contains("ffprobe"))
            .or(predicate::str::contains("tools")),
    );
}

#[test]
fn test_cli_start_help() {
    let mut cmd = clipshrink_cmd();
    cmd.args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Start the HTTP API"));
}

#[test]
fn test_cli_compress_help() {
    let mut cmd = clipshrink_cmd();
    cmd.args(["compress", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--crf"))
        .stdout(predicate::str::contains("--jobs"));
}

#[test]
fn test_cli_compress_requires_input() {
    let mut cmd = clipshrink_cmd();
    cmd.arg("compress").assert().failure();
}

#[test]
fn test_cli_compress_missing_input() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.mp4");

    let mut cmd = clipshrink_cmd();
    cmd.arg("compress")
        .arg(&missing)
        .args(["-o"])
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("does not exist, skipping"))
        .stderr(predicate::str::contains("No valid input files found"));
}

#[test]
fn test_cli_compress_rejects_unknown_preset() {
    let mut cmd = clipshrink_cmd();
    cmd.args(["compress", "clip.mp4", "--preset", "glacial"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_cli_probe_nonexistent_file() {
    let mut cmd = clipshrink_cmd();
    cmd.args(["probe", "/nonexistent/file.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_validate_config() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
[server]
port = 8080

[jobs]
retention_secs = 600
max_concurrent = 2

[defaults]
codec = "libx264"
crf = 23
"#,
    )
    .unwrap();

    let mut cmd = clipshrink_cmd();
    cmd.arg("validate")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("8080"))
        .stdout(predicate::str::contains("Max concurrent jobs: 2"))
        .stdout(predicate::str::contains("libx264 crf 23"));
}

#[test]
fn test_cli_validate_invalid_config() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "this is not = [valid toml").unwrap();

    let mut cmd = clipshrink_cmd();
    cmd.arg("validate").arg(&config_path).assert().failure();
}
