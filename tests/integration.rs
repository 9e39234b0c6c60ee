//! Integration tests for ampr-audit.
//!
//! These run the compiled binary against local snapshot files; nothing
//! here touches the network.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const SNAPSHOT: &str = r#"{
  "timestamp": "2021-01-01 00:00:00.000000",
  "prefixes": [
    {
      "prefix": "44.0.0.0/10",
      "network": "44.0.0.0",
      "masklen": 10,
      "data": { "type": "assignment", "description": "Block A", "children": true }
    },
    {
      "prefix": "44.1.2.0/24",
      "network": "44.1.2.0",
      "masklen": 24,
      "data": { "type": "assignment", "description": "Club X", "children": false }
    }
  ]
}"#;

/// Run ampr-audit with a config path that does not exist, so defaults apply
fn run_audit(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ampr-audit"))
        .args(args)
        .args(["--config", "/nonexistent/ampr-audit.yaml"])
        .output()
        .expect("Failed to execute ampr-audit")
}

fn write_snapshot(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_version_command() {
    let output = run_audit(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("ampr-audit "));
}

#[test]
fn test_help_command() {
    let output = run_audit(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("crawl"));
    assert!(stdout.contains("reconcile"));
    assert!(stdout.contains("lookup"));
}

#[test]
fn test_config_command_prints_template() {
    let output = run_audit(&["config"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("covering_prefixes"));
    assert!(stdout.contains("min_peers: 5"));
}

#[test]
fn test_lookup_exact_covered_unexplained() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path(), "20210101.json", SNAPSHOT);

    let output = run_audit(&["lookup", "44.1.2.0/24", "--snapshot", &snapshot]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "44.1.2.0/24 exact 44.1.2.0/24 \"Club X\"");

    let output = run_audit(&["lookup", "44.0.1.7", "--snapshot", &snapshot]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "44.0.1.7/32 covered 44.0.0.0/10 \"Block A\"");

    let output = run_audit(&["lookup", "44.128.0.0/16", "--snapshot", &snapshot]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "44.128.0.0/16 unexplained");
}

#[test]
fn test_lookup_invalid_prefix_fails() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path(), "20210101.json", SNAPSHOT);

    let output = run_audit(&["lookup", "44.0.0.0/33", "--snapshot", &snapshot]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid prefix"));
}

#[test]
fn test_lookup_corrupt_snapshot_fails() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path(), "20210101.json", "{\"prefixes\": [");

    let output = run_audit(&["lookup", "44.1.2.0/24", "--snapshot", &snapshot]);
    assert!(!output.status.success());
}

#[test]
fn test_lookup_uses_latest_snapshot_from_config() {
    let dir = TempDir::new().unwrap();
    write_snapshot(dir.path(), "20200101.json", r#"{"timestamp": "old", "prefixes": []}"#);
    write_snapshot(dir.path(), "20210101.json", SNAPSHOT);

    let config = dir.path().join("ampr-audit.yaml");
    std::fs::write(
        &config,
        format!("snapshot_dir: {}\n", dir.path().display()),
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_ampr-audit"))
        .args(["lookup", "44.1.2.0/24", "--config"])
        .arg(&config)
        .output()
        .expect("Failed to execute ampr-audit");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("exact"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("ampr-audit.yaml");
    std::fs::write(&config, "ripestat:\n  base_url: http://stat.ripe.net/data\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_ampr-audit"))
        .args(["lookup", "44.1.2.0/24", "--config"])
        .arg(&config)
        .output()
        .expect("Failed to execute ampr-audit");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("HTTPS"));
}

#[test]
fn test_reconcile_bad_window_fails_before_network() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path(), "20210101.json", SNAPSHOT);

    let output = run_audit(&[
        "reconcile",
        "--snapshot",
        &snapshot,
        "--start",
        "2021-01-08",
        "--end",
        "2021-01-01",
    ]);
    assert!(!output.status.success());
}

#[test]
fn test_reconcile_unknown_format_fails() {
    let output = run_audit(&["reconcile", "--format", "xml"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown format"));
}
