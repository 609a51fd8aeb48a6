//! CLI integration tests
//!
//! These tests verify the command-line interface behavior, including:
//! - Argument parsing and validation
//! - Configuration display
//! - Exit codes when the build engine cannot be reached

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "BUILD_RETRY_MAX_ATTEMPTS",
    "BUILD_RETRY_DELAY_SECS",
    "BUILD_RETRY_BASE_IMAGE",
    "BUILD_RETRY_WARMUP",
    "BUILD_RETRY_ENGINE",
    "BUILD_RETRY_CONTEXT",
    "BUILD_RETRY_LOG_LEVEL",
    "BUILD_RETRY_LOG_JSON",
    "RUST_LOG",
];

fn build_retry_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_build-retry"))
}

/// Command with a clean `BUILD_RETRY_*` environment
fn build_retry() -> Command {
    let mut command = Command::new(build_retry_bin());
    for var in ENV_VARS {
        command.env_remove(var);
    }
    command
}

fn run(command: &mut Command) -> Output {
    command.output().expect("Failed to execute build-retry")
}

#[test]
fn test_cli_help() {
    let output = run(build_retry().arg("--help"));

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("build-retry"));
    assert!(stdout.contains("--max-attempts"));
    assert!(stdout.contains("--file"));
}

#[test]
fn test_cli_version() {
    let output = run(build_retry().arg("--version"));

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_flag_is_usage_error() {
    let output = run(build_retry().arg("--retries-forever"));
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_verbose_and_quiet_conflict() {
    let output = run(build_retry().args(["-v", "-q"]));
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_zero_attempts_rejected() {
    let output = run(build_retry().args(["--max-attempts", "0", "--print-config"]));

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Max attempts must be at least 1"));
}

#[test]
fn test_bad_environment_value_rejected() {
    let output = run(build_retry()
        .env("BUILD_RETRY_DELAY_SECS", "soon")
        .arg("--print-config"));

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("BUILD_RETRY_DELAY_SECS"));
}

#[test]
fn test_print_config_human() {
    let output = run(build_retry().arg("--print-config"));

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Build Retry Configuration:"));
    assert!(stdout.contains("Max Attempts: 3"));
    assert!(stdout.contains("Retry Delay: 10s"));
    assert!(stdout.contains("python:3.11-slim"));
}

#[test]
fn test_print_config_flags_override_environment() {
    let output = run(build_retry()
        .env("BUILD_RETRY_MAX_ATTEMPTS", "7")
        .env("BUILD_RETRY_DELAY_SECS", "30")
        .args(["--delay", "2", "--format", "json", "--print-config"]));

    assert!(output.status.success());
    let config: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("config should be JSON");
    assert_eq!(config["max_attempts"], "7");
    assert_eq!(config["delay_secs"], "2");
}

#[test]
fn test_unreachable_engine_exits_without_attempts() {
    let context = TempDir::new().unwrap();
    fs::write(context.path().join("Dockerfile"), "FROM scratch\n").unwrap();
    let empty_path = TempDir::new().unwrap();

    // No docker binary on PATH
    let output = run(build_retry()
        .env("PATH", empty_path.path())
        .args(["app", "--engine", "cli", "--format", "kv", "--delay", "0"])
        .arg("--context")
        .arg(context.path()));

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("event=engine_unavailable"));
    assert!(stdout.contains("outcome=precondition_failed"));
    assert!(!stdout.contains("event=attempt_started"));
    assert!(!stdout.contains("event=retry_scheduled"));
}
