//! CLI integration tests: exit codes and output modes.

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const VALID: &str = r#"
[market]
base_url = "http://127.0.0.1:9"
timeout_ms = 500

[[subscriptions]]
user = 42
pool = "any"
"#;

fn poolsentry(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("poolsentry");
    // Keep a stray .env or exported overrides out of the run.
    cmd.current_dir(dir.path())
        .env_remove("MAX_SLIPPAGE")
        .env_remove("POOL_API_URL")
        .env_remove("MAX_SINGLE_INVESTMENT_USD")
        .env_remove("MAX_DAILY_EXPOSURE_USD");
    cmd
}

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, contents).expect("write temp config");
    path
}

#[test]
fn help_lists_commands() {
    let dir = TempDir::new().unwrap();
    poolsentry(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("cycle"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn version_names_the_binary() {
    let dir = TempDir::new().unwrap();
    poolsentry(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("poolsentry"));
}

#[test]
fn valid_config_passes_check() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, VALID);
    poolsentry(&dir)
        .args(["check", "config", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration file is valid"))
        .stdout(predicate::str::contains("http://127.0.0.1:9"));
}

#[test]
fn default_config_path_is_the_working_directory() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, VALID);
    poolsentry(&dir).args(["check", "config"]).assert().success();
}

#[test]
fn invalid_slippage_exits_with_one() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "[market]\nbase_url = \"http://127.0.0.1:9\"\n\n[risk]\nmax_slippage = 1.5\n",
    );
    let output = poolsentry(&dir)
        .args(["check", "config", "--config"])
        .arg(&path)
        .output()
        .expect("run poolsentry");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("max_slippage"), "stderr: {stderr}");
}

#[test]
fn missing_pool_api_url_exits_with_one() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[agent]\ninterval_secs = 60\n");
    poolsentry(&dir)
        .args(["check", "config", "--config"])
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("market.base_url"));
}

#[test]
fn missing_config_file_exits_with_one() {
    let dir = TempDir::new().unwrap();
    poolsentry(&dir)
        .args(["check", "config", "--config", "absent.toml"])
        .assert()
        .code(1);
}

#[test]
fn unreachable_pool_api_exits_with_two() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, VALID);
    poolsentry(&dir)
        .args(["check", "connection", "--config"])
        .arg(&path)
        .assert()
        .code(2);
}

#[test]
fn json_mode_emits_typed_lines() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, VALID);
    let output = poolsentry(&dir)
        .args(["--json", "check", "config", "--config"])
        .arg(&path)
        .output()
        .expect("run poolsentry");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("every line is JSON"))
        .collect();
    assert!(!lines.is_empty());
    assert!(lines.iter().all(|v| v.get("type").is_some()));
    assert!(lines.iter().any(|v| v["type"] == "section"));
}

#[test]
fn json_mode_reports_errors_as_json() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[risk]\nmax_slippage = 1.5\n");
    let output = poolsentry(&dir)
        .args(["--json", "check", "config", "--config"])
        .arg(&path)
        .output()
        .expect("run poolsentry");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr.lines().last().expect("an error line");
    let value: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(value["type"], "error");
}
