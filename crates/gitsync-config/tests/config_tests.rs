//! Integration tests for configuration loading and validation

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gitsync_config::{
    Auth, Config, Error, Reference, Secret, TaskConfig, WireAuth, load_targets,
    normalize_interval,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tempfile::TempDir;

fn write_config(temp: &TempDir, file_name: &str, content: &str) -> PathBuf {
    let path = temp.path().join(file_name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_full_yaml_task() {
    let temp = TempDir::new().unwrap();
    let path = write_config(
        &temp,
        "tasks.yaml",
        r#"
tasks:
  - name: charts
    url: https://git.example.test/platform/charts.git
    path: /srv/charts
    insecure: true
    depth: 1
    submodules: true
    remoteName: upstream
    reference:
      tag: v1.2.3
    runOnce: true
    intervalSeconds: 90
    force: true
    singleBranch: false
    progress: true
    auth:
      bearerToken:
        value: abc
"#,
    );

    let targets = load_targets(&path).unwrap();
    assert_eq!(targets.len(), 1);

    let target = &targets[0];
    assert_eq!(target.name(), "charts");
    assert_eq!(target.path(), Path::new("/srv/charts"));
    assert!(target.insecure());
    assert_eq!(target.depth(), 1);
    assert!(target.submodules());
    assert_eq!(target.remote_name(), "upstream");
    assert_eq!(target.reference(), &Reference::Tag("v1.2.3".into()));
    assert!(target.run_once());
    assert_eq!(target.interval(), Duration::from_secs(90));
    assert!(target.force());
    assert_eq!(target.single_branch(), Some(false));
    assert!(target.progress());
    assert_eq!(target.auth(), Some(&Auth::BearerToken(Secret::literal("abc"))));
}

#[test]
fn test_scenario_interval_floor_and_branch() {
    let temp = TempDir::new().unwrap();
    let path = write_config(
        &temp,
        "tasks.yml",
        r#"
tasks:
  - name: a
    url: https://example.test/repo.git
    path: /tmp/a
    reference: { branch: main }
    intervalSeconds: 5
"#,
    );

    let targets = load_targets(&path).unwrap();
    assert_eq!(targets[0].interval(), Duration::from_secs(20));
    assert_eq!(
        targets[0].reference().full_name().as_deref(),
        Some("refs/heads/main")
    );
}

#[test]
fn test_empty_reference_mapping() {
    let temp = TempDir::new().unwrap();
    let path = write_config(
        &temp,
        "tasks.yaml",
        "tasks:\n  - name: a\n    url: http://example.test/r\n    path: /tmp/a\n    reference: {}\n",
    );

    let targets = load_targets(&path).unwrap();
    assert_eq!(targets[0].reference(), &Reference::Default);
}

#[test]
fn test_load_json_config() {
    let temp = TempDir::new().unwrap();
    let path = write_config(
        &temp,
        "tasks.json",
        r#"{"tasks":[{"name":"a","url":"https://example.test/r","path":"/tmp/a","auth":{"basic":{"user":{"value":"u"},"password":{"valueFrom":{"env":"GITSYNC_TEST_UNUSED"}}}}}]}"#,
    );

    let targets = load_targets(&path).unwrap();
    assert!(matches!(targets[0].auth(), Some(Auth::Basic(_))));
}

#[test]
fn test_unsupported_extension() {
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp, "tasks.ini", "tasks=");
    assert!(matches!(
        Config::load(&path),
        Err(Error::UnsupportedFormat { extension }) if extension == "ini"
    ));
}

#[test]
fn test_unknown_key_is_a_parse_error() {
    let temp = TempDir::new().unwrap();
    let path = write_config(
        &temp,
        "tasks.yaml",
        "tasks:\n  - name: a\n    url: https://example.test/r\n    path: /tmp/a\n    intervalSecond: 30\n",
    );
    assert!(matches!(Config::load(&path), Err(Error::ConfigParse { .. })));
}

#[test]
fn test_missing_file_is_io_error() {
    let temp = TempDir::new().unwrap();
    let err = Config::load(&temp.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

#[test]
fn test_multiple_auth_modes_fail_validation() {
    let temp = TempDir::new().unwrap();
    let path = write_config(
        &temp,
        "tasks.yaml",
        r#"
tasks:
  - name: a
    url: https://example.test/r
    path: /tmp/a
    auth:
      bearerToken: { value: one }
      basicToken: { value: two }
"#,
    );
    let err = load_targets(&path).unwrap_err();
    assert!(matches!(err, Error::InvalidAuth { .. }));
}

#[test]
fn test_secret_with_two_sources_fails_validation() {
    let temp = TempDir::new().unwrap();
    let path = write_config(
        &temp,
        "tasks.yaml",
        r#"
tasks:
  - name: a
    url: https://example.test/r
    path: /tmp/a
    auth:
      basicToken:
        value: one
        valueFrom: { env: TOKEN }
"#,
    );
    assert!(load_targets(&path).is_err());
}

#[test]
fn test_duplicate_detected_before_later_tasks_are_validated() {
    let config = Config {
        tasks: vec![
            TaskConfig::new("a", "https://x.test/1", "/tmp/p1"),
            TaskConfig::new("a", "https://x.test/2", "/tmp/p2"),
            TaskConfig::new("c", "ftp://x.test/3", "/tmp/p3"),
        ],
    };
    assert!(matches!(config.validate(), Err(Error::NameNotUnique { .. })));
}

#[test]
fn test_env_secret_resolves_at_use_time() {
    let name = "GITSYNC_CONFIG_TEST_BEARER";
    // SAFETY: the variable name is unique to this test.
    unsafe { std::env::set_var(name, "from-env") };

    let auth = Auth::BearerToken(Secret::from_env(name));
    assert_eq!(auth.render().unwrap(), WireAuth::Header("Bearer from-env".into()));

    unsafe { std::env::remove_var(name) };
    assert!(matches!(auth.render(), Err(Error::SecretResolution { .. })));
}

#[test]
fn test_file_secret_resolves_at_use_time() {
    let temp = TempDir::new().unwrap();
    let secret_path = temp.path().join("password");
    fs::write(&secret_path, "pw").unwrap();

    let secret = Secret::from_file(&secret_path);
    assert_eq!(secret.resolve().unwrap(), "pw");
}

proptest! {
    #[test]
    fn prop_interval_never_below_floor(seconds in proptest::option::of(any::<i64>())) {
        let interval = normalize_interval(seconds);
        prop_assert!(interval >= Duration::from_secs(20));
        match seconds {
            Some(s) if s > 0 => {}
            _ => prop_assert_eq!(interval, Duration::from_secs(60)),
        }
    }
}
