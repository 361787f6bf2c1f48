//! Basic CLI tests for the plughost command-line host.

use assert_cmd::Command;
use predicates::prelude::*;

fn plughost(root: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("plughost").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("PLUGHOST_LOG_JSON")
        .arg("--libs-dir")
        .arg(root.join("libs"))
        .arg("--plugins-dir")
        .arg(root.join("plugins"))
        .arg("--configs-dir")
        .arg(root.join("configs"))
        .arg("--logs-dir")
        .arg(root.join("logs"));
    cmd
}

/// Test that the CLI binary exists and shows help.
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("plughost").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("--plugins-dir"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("plughost").unwrap();
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("plughost"));
}

/// Test that providing no subcommand shows an error.
#[test]
fn test_no_subcommand_shows_error() {
    let mut cmd = Command::cargo_bin("plughost").unwrap();

    cmd.assert().failure();
}

#[test]
fn test_list_empty_plugins_dir() {
    let dir = tempfile::tempdir().unwrap();

    plughost(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No extensions found"));

    assert!(dir.path().join("plugins").is_dir());
    assert!(dir.path().join("libs").is_dir());
}

#[test]
fn test_list_reports_broken_module() {
    let dir = tempfile::tempdir().unwrap();
    let plugins = dir.path().join("plugins");
    std::fs::create_dir_all(&plugins).unwrap();
    std::fs::write(
        plugins.join(format!("broken.{}", std::env::consts::DLL_EXTENSION)),
        b"not a library",
    )
    .unwrap();

    plughost(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped"))
        .stdout(predicate::str::contains("broken"));
}

#[test]
fn test_run_exits_on_console_exit_and_writes_log() {
    let dir = tempfile::tempdir().unwrap();

    plughost(dir.path())
        .arg("run")
        .write_stdin("status\nexit\n")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("Type 'exit' or 'quit' to stop"));

    let logs: Vec<_> = std::fs::read_dir(dir.path().join("logs"))
        .unwrap()
        .flatten()
        .map(|e| e.path())
        .collect();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].extension().is_some_and(|e| e == "log"));

    let contents = std::fs::read_to_string(&logs[0]).unwrap();
    assert!(contents.contains("Shutdown requested from console"), "{}", contents);
    assert!(contents.lines().all(|l| l.starts_with("[PlugHost-")), "{}", contents);
}

#[test]
fn test_run_quit_is_accepted() {
    let dir = tempfile::tempdir().unwrap();

    plughost(dir.path())
        .env("PLUGHOST_LOG_PREFIX", "Edge")
        .arg("run")
        .write_stdin("quit\n")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success();

    let log = std::fs::read_dir(dir.path().join("logs"))
        .unwrap()
        .flatten()
        .next()
        .unwrap()
        .path();
    let contents = std::fs::read_to_string(log).unwrap();
    assert!(contents.starts_with("[Edge-INFO-"), "{}", contents);
}
