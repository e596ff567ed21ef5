//! CLI integration tests

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const DOC: &str = r#"{
    "enable": false,
    "cpuReclaimThresholdPercent": 65,
    "memoryReclaimThresholdPercent": 65,
    "degradeTimeMinutes": 15,
    "nodeConfigs": [
        { "nodeSelector": { "matchLabels": { "zone": "a" } }, "enable": true },
        { "nodeSelector": { "matchLabels": {} }, "enable": true },
        { "nodeSelector": { "matchLabels": { "pool": "batch" } }, "cpuReclaimThresholdPercent": 90 }
    ]
}"#;

/// Run `colo` with an isolated HOME so no user config is picked up
fn colo(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_colo"))
        .args(args)
        .env("HOME", home)
        .env_remove("COLO_API_URL")
        .output()
        .expect("Failed to execute colo")
}

fn write_doc(dir: &TempDir, contents: &str) -> String {
    let path = dir.path().join("colocation.json");
    std::fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    let output = colo(home.path(), &["--help"]);

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("colocation"), "Should show about text");
    assert!(stdout.contains("validate"), "Should show validate command");
    assert!(stdout.contains("resolve"), "Should show resolve command");
    assert!(stdout.contains("get"), "Should show get command");
    assert!(stdout.contains("status"), "Should show status command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    let output = colo(home.path(), &["--version"]);

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("colo"), "Should show binary name");
}

/// Test get nodes subcommand help
#[test]
fn test_get_nodes_help() {
    let home = TempDir::new().unwrap();
    let output = colo(home.path(), &["get", "nodes", "--help"]);

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Get nodes help should succeed");
    assert!(stdout.contains("--selector"), "Should show selector option");
}

#[test]
fn test_validate_accepts_document_with_bad_override() {
    let home = TempDir::new().unwrap();
    let file = write_doc(&home, DOC);

    let output = colo(home.path(), &["--format", "json", "validate", &file]);

    assert!(output.status.success(), "Invalid overrides are only warnings");
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["valid"], true);
    assert_eq!(report["overrides"][0]["valid"], true);
    assert_eq!(report["overrides"][1]["valid"], false);
    assert_eq!(report["overrides"][2]["valid"], true);
}

#[test]
fn test_validate_fails_on_invalid_default() {
    let home = TempDir::new().unwrap();
    let file = write_doc(&home, r#"{ "enable": true, "cpuReclaimThresholdPercent": -1 }"#);

    let output = colo(home.path(), &["validate", &file]);

    assert!(!output.status.success(), "Invalid default must fail");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_validate_missing_file_fails() {
    let home = TempDir::new().unwrap();
    let missing = home.path().join("nope.json");

    let output = colo(home.path(), &["validate", &missing.to_string_lossy()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read"));
}

#[test]
fn test_resolve_reports_matched_group() {
    let home = TempDir::new().unwrap();
    let file = write_doc(&home, DOC);

    let output = colo(
        home.path(),
        &[
            "--format", "json", "resolve", &file, "--label", "zone=a", "--label", "pool=batch",
        ],
    );

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["matchedGroup"], 0);
    assert_eq!(report["strategy"]["enable"], true);
    assert_eq!(report["strategy"]["cpuReclaimThresholdPercent"], 65);
    assert_eq!(report["labels"]["pool"], "batch");
}

#[test]
fn test_resolve_without_match_returns_default() {
    let home = TempDir::new().unwrap();
    let file = write_doc(&home, DOC);

    let output = colo(
        home.path(),
        &["--format", "json", "resolve", &file, "-l", "zone=z"],
    );

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(report.get("matchedGroup").is_none());
    assert_eq!(report["strategy"]["enable"], false);
    assert_eq!(report["strategy"]["degradeTimeMinutes"], 15);
}

#[test]
fn test_format_from_config_file() {
    let home = TempDir::new().unwrap();
    let file = write_doc(&home, DOC);
    let config_dir = home.path().join(".config").join("colo");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.json"),
        r#"{ "default_format": "json" }"#,
    )
    .unwrap();

    let output = colo(home.path(), &["validate", &file]);

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["valid"], true);
}

#[test]
fn test_get_strategy_unreachable_agent_fails() {
    let home = TempDir::new().unwrap();

    let output = colo(
        home.path(),
        &["--api-url", "http://127.0.0.1:1", "get", "strategy", "worker-1"],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to send request"));
}
