//! Integration tests for the CLI binary.
//!
//! These run the built `confirmer` binary against temporary config files
//! and check its exit status and output.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Run the CLI with `args` from inside `dir`.
fn run_cli(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_confirmer"))
        .current_dir(dir)
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("Failed to execute CLI command")
}

/// Assert a command succeeded.
fn assert_success(output: &Output, context: &str) {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        panic!("{} failed:\nstdout: {}\nstderr: {}", context, stdout, stderr);
    }
}

/// Write a config that keeps logs inside the temp dir.
fn write_config(temp: &TempDir) -> PathBuf {
    let path = temp.path().join("config.ini");
    let log_dir = temp.path().join("logs");
    fs::write(
        &path,
        format!(
            "[coordinator]\ndefault_timeout_ms = 5000\n\n[logging]\ndirectory = {}\nfile = demo.log\n",
            log_dir.display()
        ),
    )
    .expect("Failed to write config");
    path
}

#[test]
fn test_config_init_then_show() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let config = temp.path().join("nested").join("config.ini");
    let config_arg = config.to_str().unwrap();

    let output = run_cli(temp.path(), &["--config", config_arg, "config", "init"]);
    assert_success(&output, "config init");
    assert!(config.exists());

    let output = run_cli(temp.path(), &["--config", config_arg, "config", "show"]);
    assert_success(&output, "config show");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[coordinator]"));
    assert!(stdout.contains("default_timeout_ms = none"));
}

#[test]
fn test_config_init_refuses_existing_file() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(&temp);

    let output = run_cli(
        temp.path(),
        &["--config", config.to_str().unwrap(), "config", "init"],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("already exists"));
}

#[test]
fn test_invalid_config_exits_with_error() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let config = temp.path().join("config.ini");
    fs::write(&config, "[coordinator]\nstall_threshold_secs = never\n").unwrap();

    let output = run_cli(
        temp.path(),
        &["--config", config.to_str().unwrap(), "demo", "serial"],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("coordinator.stall_threshold_secs"));
}

#[test]
fn test_demo_runs_every_scenario() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(&temp);

    let output = run_cli(
        temp.path(),
        &["--config", config.to_str().unwrap(), "demo", "all"],
    );
    assert_success(&output, "demo all");

    let stdout = String::from_utf8_lossy(&output.stdout);
    for scenario in ["serial", "parallel", "squash", "last-wins", "timeout"] {
        assert!(
            stdout.contains(&format!("== {} ==", scenario)),
            "missing scenario {} in:\n{}",
            scenario,
            stdout
        );
    }
    assert!(stdout.contains("333: success 14"));
    assert!(!stdout.contains("333: success 12"));
    assert!(temp.path().join("logs").join("demo.log").exists());
}
