//! Integration tests for the codesim CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Test helper to get the CLI binary
fn codesim_cmd() -> Command {
    Command::cargo_bin("codesim").unwrap()
}

fn write_artifact(root: &Path, iteration: u32, source: &str) {
    let dir = root.join(format!("code/calculator/zero_shot/temp_0.2/iteration_{iteration}"));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("claude.py"), source).unwrap();
}

fn sample_experiment(root: &Path) {
    write_artifact(root, 1, "def add(a, b):\n    return a + b\n");
    write_artifact(root, 2, "def add(x, y):\n    return x + y\n");
    write_artifact(root, 3, "def add(a, b):\n    total = a + b\n    return total\n");
}

#[test]
fn test_help_lists_commands() {
    codesim_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("compare"))
        .stdout(predicate::str::contains("summary"));
}

#[test]
fn test_print_default_config() {
    codesim_cmd()
        .arg("print-default-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("metric_set_version"))
        .stdout(predicate::str::contains("max_order: 4"));
}

#[test]
fn test_compare_missing_directory_fails() {
    let temp_dir = tempdir().unwrap();
    codesim_cmd()
        .arg("compare")
        .arg(temp_dir.path().join("absent"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_compare_then_summary() {
    let temp_dir = tempdir().unwrap();
    sample_experiment(temp_dir.path());

    codesim_cmd()
        .args(["compare", "--workers", "2", "--export-visualization"])
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("computed"));

    let cache = temp_dir.path().join("similarity_analysis");
    assert!(cache.join("summary.json").is_file());

    let output = codesim_cmd()
        .args(["summary", "--json"])
        .arg(temp_dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let summary = &report["summary"];
    assert_eq!(summary["total_comparisons"], 6);
    assert_eq!(summary["models"][0], "claude");
    assert!(summary["per_metric_means"]["bleu"].is_number());
    let grade = report["buckets"][0]["consistency"]["grade"].as_str().unwrap();
    assert!(["A", "B", "C", "D", "F"].contains(&grade));
}

#[test]
fn test_invalid_config_file_fails() {
    let temp_dir = tempdir().unwrap();
    sample_experiment(temp_dir.path());
    let config_path = temp_dir.path().join("codesim.yml");
    fs::write(&config_path, "batch:\n  workers: 0\n").unwrap();

    codesim_cmd()
        .arg("compare")
        .arg(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .assert()
        .failure();

    codesim_cmd()
        .arg("validate-config")
        .arg(&config_path)
        .assert()
        .failure();
}

#[test]
fn test_summary_of_empty_experiment() {
    let temp_dir = tempdir().unwrap();
    codesim_cmd()
        .arg("summary")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached comparisons"));
}
