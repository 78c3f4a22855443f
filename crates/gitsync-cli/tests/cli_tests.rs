//! Integration tests for the git-sync binary.
//!
//! These tests exercise the compiled binary using assert_cmd. None of them
//! reach a real remote.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

/// Command for the git-sync binary with no inherited configuration.
fn git_sync() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("git-sync"));
    for var in [
        "CONFIG",
        "GIT_SYNC_CONFIG",
        "LOG_LEVEL",
        "GIT_SYNC_LOG_LEVEL",
        "LOG_FORMAT",
        "GIT_SYNC_LOG_FORMAT",
        "LOG_PRETTY",
        "GIT_SYNC_LOG_PRETTY",
        "LOG_COLORS",
        "GIT_SYNC_LOG_COLORS",
        "GIT_SYNC_SERVER",
        "GIT_SYNC_PORT",
        "GIT_SYNC_ISOLATE_FAILURES",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.timeout(Duration::from_secs(120));
    cmd
}

fn write_config(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_help_output() {
    git_sync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("git-sync"))
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--isolate-failures"));
}

#[test]
fn test_missing_config_flag() {
    git_sync()
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("configuration file is required"));
}

#[test]
fn test_port_zero_is_rejected() {
    git_sync()
        .args(["--config", "tasks.yaml", "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid server port 0"));
}

#[test]
fn test_missing_config_file() {
    let temp = TempDir::new().unwrap();
    git_sync()
        .arg("--config")
        .arg(temp.path().join("absent.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("absent.yaml"));
}

#[test]
fn test_bare_config_alias_is_used() {
    let temp = TempDir::new().unwrap();
    git_sync()
        .env("CONFIG", temp.path().join("from-alias.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("from-alias.yaml"));
}

#[test]
fn test_bare_config_alias_beats_prefixed_name() {
    let temp = TempDir::new().unwrap();
    git_sync()
        .env("CONFIG", temp.path().join("bare.yaml"))
        .env("GIT_SYNC_CONFIG", temp.path().join("prefixed.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("bare.yaml"))
        .stderr(predicate::str::contains("prefixed.yaml").not());
}

#[test]
fn test_prefixed_config_name_is_used_alone() {
    let temp = TempDir::new().unwrap();
    git_sync()
        .env("GIT_SYNC_CONFIG", temp.path().join("prefixed.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("prefixed.yaml"));
}

#[test]
fn test_duplicate_task_names_abort_before_any_sync() {
    let temp = TempDir::new().unwrap();
    let first = temp.path().join("first");
    let second = temp.path().join("second");
    let config = write_config(
        &temp,
        "tasks.yaml",
        &format!(
            "tasks:\n  - name: app\n    url: https://example.test/a.git\n    path: {}\n  - name: app\n    url: https://example.test/b.git\n    path: {}\n",
            first.display(),
            second.display()
        ),
    );

    git_sync()
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Task name 'app' is not unique"));

    assert!(!first.exists());
    assert!(!second.exists());
}

#[test]
fn test_unsupported_scheme_is_a_configuration_error() {
    let temp = TempDir::new().unwrap();
    let config = write_config(
        &temp,
        "tasks.json",
        &format!(
            r#"{{"tasks": [{{"name": "app", "url": "ssh://git@example.test/a.git", "path": "{}"}}]}}"#,
            temp.path().join("app").display()
        ),
    );

    git_sync()
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("scheme 'ssh' is not supported"));
}

#[test]
fn test_unknown_config_key_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config = write_config(
        &temp,
        "tasks.yaml",
        "tasks:\n  - name: app\n    url: https://example.test/a.git\n    path: /tmp/x\n    intervall: 30\n",
    );

    git_sync()
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse"));
}

#[test]
fn test_clone_failure_is_fatal_by_default() {
    let temp = TempDir::new().unwrap();
    let config = write_config(
        &temp,
        "tasks.yaml",
        &format!(
            "tasks:\n  - name: unreachable\n    url: http://127.0.0.1:1/repo.git\n    path: {}\n",
            temp.path().join("work").display()
        ),
    );

    git_sync()
        .arg("--config")
        .arg(&config)
        .env("GIT_TERMINAL_PROMPT", "0")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("clone unreachable"));
}
