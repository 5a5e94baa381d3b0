//! Corruption recovery tests for the medley binary.
//!
//! These tests verify the system can handle:
//! - Corrupted collection files
//! - Records that no longer decode
//! - A corrupted or missing reminder file
//! - Empty files

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("medley"))
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[test]
fn test_corrupted_medications_file() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    fs::write(data_dir.join("medications.json"), "{ invalid json }}}}")
        .expect("Failed to write corrupted medications");

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No medications yet."));

    // Adding overwrites the unreadable file with a valid collection
    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["add", "--name", "Paracetamol", "--dosage", "500mg"])
        .assert()
        .success();

    let contents = fs::read_to_string(data_dir.join("medications.json")).unwrap();
    let medications: Vec<serde_json::Value> = serde_json::from_str(&contents).unwrap();
    assert_eq!(medications.len(), 1);
}

#[test]
fn test_undecodable_record_is_skipped() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["add", "--name", "Paracetamol", "--dosage", "500mg"])
        .assert()
        .success();

    // Append a record missing required fields
    let path = data_dir.join("medications.json");
    let contents = fs::read_to_string(&path).unwrap();
    let mut records: Vec<serde_json::Value> = serde_json::from_str(&contents).unwrap();
    records.push(serde_json::json!({ "name": "Broken" }));
    fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Paracetamol"))
        .stdout(predicate::str::contains("Broken").not());
}

#[test]
fn test_corrupted_reminder_file() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["add", "--name", "Paracetamol", "--dosage", "500mg"])
        .assert()
        .success();

    fs::write(data_dir.join("reminders.json"), "not json at all").unwrap();

    // Start-up resync reschedules the reminder that was lost
    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .arg("reminders")
        .assert()
        .success()
        .stdout(predicate::str::contains("No pending reminders."));

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .arg("list")
        .assert()
        .success();

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .arg("reminders")
        .assert()
        .success()
        .stdout(predicate::str::contains("Time to take Paracetamol (500mg)"));
}

#[test]
fn test_empty_files() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    for name in ["medications.json", "symptoms.json", "moods.json", "escripts.json", "reminders.json"] {
        fs::write(data_dir.join(name), "").unwrap();
    }

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Upcoming doses:"));

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["mood", "add", "okay"])
        .assert()
        .success();
}

#[test]
fn test_missing_data_dir_is_created() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("nested/medley");

    cli()
        .arg("--data-dir")
        .arg(&data_dir)
        .args(["symptom", "add", "--name", "Cough", "--severity", "3"])
        .assert()
        .success();

    assert!(data_dir.join("symptoms.json").exists());
}
