//! End-to-end tests for the vidsup binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn vidsup() -> Command {
    let mut cmd = Command::cargo_bin("vidsup").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_config_prints_defaults_as_toml() {
    let dir = TempDir::new().unwrap();
    vidsup()
        .current_dir(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[supervisor]"))
        .stdout(predicate::str::contains("grace_period_ms = 5000"));
}

#[test]
fn test_config_applies_env_and_cli_overrides() {
    let dir = TempDir::new().unwrap();
    vidsup()
        .current_dir(dir.path())
        .env("VIDSUP_DIAGNOSTIC_LINES", "9")
        .args(["--grace-ms", "750", "config", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"grace_period_ms\": 750"))
        .stdout(predicate::str::contains("\"diagnostic_lines\": 9"));
}

#[test]
fn test_config_reads_file_from_working_directory() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("vidsup.toml"), "[supervisor]\ncancel_key = \"x\"\n").unwrap();
    vidsup()
        .current_dir(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("cancel_key = \"x\""));
}

#[test]
fn test_invalid_env_override_fails() {
    let dir = TempDir::new().unwrap();
    vidsup()
        .current_dir(dir.path())
        .env("VIDSUP_GRACE_PERIOD_MS", "soon")
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("grace_period_ms"));
}

#[test]
fn test_copy_reports_completion() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.mov");
    let output = dir.path().join("out.mov");
    std::fs::write(&input, vec![7u8; 2048]).unwrap();

    vidsup()
        .current_dir(dir.path())
        .args(["copy", "--input"])
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Completed:"))
        .stdout(predicate::str::contains("2.00 KB"));

    assert_eq!(std::fs::read(&output).unwrap().len(), 2048);
}

#[test]
fn test_copy_missing_input_fails() {
    let dir = TempDir::new().unwrap();
    vidsup()
        .current_dir(dir.path())
        .args(["copy", "--input", "missing.mov", "--output", "out.mov"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Input file does not exist"));
}

#[cfg(unix)]
#[test]
fn test_exec_reports_completion_as_json() {
    let dir = TempDir::new().unwrap();
    vidsup()
        .current_dir(dir.path())
        .args(["exec", "--output", "out.mp4", "--json", "--", "sh", "-c", "printf abc > out.mp4"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("\"status\":\"completed\""))
        .stdout(predicate::str::contains("\"size\":3"));
}

#[cfg(unix)]
#[test]
fn test_exec_failure_exits_with_one() {
    let dir = TempDir::new().unwrap();
    vidsup()
        .current_dir(dir.path())
        .args(["exec", "--output", "out.mp4", "--", "sh", "-c", "exit 4"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Failed: Process failed with code 4"));
}
