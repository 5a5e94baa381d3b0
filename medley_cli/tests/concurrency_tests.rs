//! Concurrency tests for the medley binary.
//!
//! These tests verify that several processes sharing one data directory:
//! - Never lose medications or reminders written by each other
//! - Hand out distinct reminder numbers
//! - Append journal entries without clobbering each other

use assert_cmd::Command;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::thread;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("medley"))
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn read_json(path: &Path) -> Vec<Value> {
    let contents = std::fs::read_to_string(path).expect("Failed to read file");
    serde_json::from_str(&contents).expect("Invalid JSON")
}

#[test]
fn test_concurrent_adds_keep_every_medication() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                cli()
                    .arg("--data-dir")
                    .arg(&data_dir)
                    .args(["add", "--name", &format!("Med{}", i), "--dosage", "10mg"])
                    .assert()
                    .success();
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Writer thread panicked");
    }

    let medications = read_json(&data_dir.join("medications.json"));
    assert_eq!(
        medications.len(),
        6,
        "Expected 6 medications, got {}",
        medications.len()
    );

    let ids: HashSet<u64> = medications
        .iter()
        .map(|m| m["notification_id"].as_u64().expect("Missing notification id"))
        .collect();
    assert_eq!(ids.len(), 6, "Reminder numbers were reused: {:?}", ids);

    let reminders = read_json(&data_dir.join("reminders.json"));
    assert_eq!(
        reminders.len(),
        6,
        "Expected 6 reminders, got {}",
        reminders.len()
    );
}

#[test]
fn test_concurrent_takes_and_adds() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    cli()
        .arg("--data-dir")
        .arg(&data_dir)
        .args(["add", "--name", "Paracetamol", "--dosage", "500mg"])
        .assert()
        .success();

    let mut handles = Vec::new();
    for i in 0..3 {
        let data_dir = data_dir.clone();
        handles.push(thread::spawn(move || {
            cli()
                .arg("--data-dir")
                .arg(&data_dir)
                .args(["add", "--name", &format!("Vitamin{}", i), "--dosage", "1 tab"])
                .assert()
                .success();
        }));
    }
    for _ in 0..3 {
        let data_dir = data_dir.clone();
        handles.push(thread::spawn(move || {
            cli()
                .arg("--data-dir")
                .arg(&data_dir)
                .args(["take", "Paracetamol"])
                .assert()
                .success();
        }));
    }
    for handle in handles {
        handle.join().expect("Worker thread panicked");
    }

    let medications = read_json(&data_dir.join("medications.json"));
    assert_eq!(medications.len(), 4);
    assert!(medications
        .iter()
        .any(|m| m["name"] == "Paracetamol" && m["last_taken_at"].is_string()));

    // One reminder per medication, each matching its stored due time
    let reminders = read_json(&data_dir.join("reminders.json"));
    assert_eq!(reminders.len(), 4);
    for medication in &medications {
        let reminder = reminders
            .iter()
            .find(|r| r["notification_id"] == medication["notification_id"])
            .expect("Medication has no reminder");
        assert_eq!(reminder["fires_at"], medication["next_dose_at"]);
    }
}

#[test]
fn test_concurrent_journal_entries() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                let severity = (i % 10 + 1).to_string();
                cli()
                    .arg("--data-dir")
                    .arg(&data_dir)
                    .args(["symptom", "add", "--name", "Cough", "--severity", &severity])
                    .assert()
                    .success();
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Writer thread panicked");
    }

    let symptoms = read_json(&data_dir.join("symptoms.json"));
    assert_eq!(symptoms.len(), 6, "Expected 6 symptoms, got {}", symptoms.len());
}
