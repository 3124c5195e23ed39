//! Integration tests for the prises binary.
//!
//! These tests verify end-to-end behavior including:
//! - Medication and shot workflows
//! - Durable state across runs
//! - JSON export/import and list import

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// CLI bound to a data dir, isolated from the user's config
fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("prises"));
    cmd.env("XDG_CONFIG_HOME", data_dir.join("config"))
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

/// Decoded value of a persisted store entry
fn read_entry(data_dir: &Path, key: &str) -> Value {
    let path = data_dir.join("store").join(format!("{}.json", key));
    let raw = fs::read_to_string(&path).expect("Failed to read store entry");
    let envelope: Value = serde_json::from_str(&raw).expect("Invalid store entry");
    assert_eq!(envelope["version"], 1);
    envelope["value"].clone()
}

fn add_medication(data_dir: &Path, args: &[&str]) {
    cli(data_dir)
        .args(["med", "add"])
        .args(args)
        .assert()
        .success()
        .stdout(predicate::str::contains("Added medication"));
}

fn only_shot_id(data_dir: &Path) -> String {
    let shots = read_entry(data_dir, "shots");
    let map = shots.as_object().expect("shots should be a keyed object");
    assert_eq!(map.len(), 1);
    map.keys().next().unwrap().clone()
}

fn find_export(dir: &Path) -> PathBuf {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().ends_with("-chronoprises.json"))
                .unwrap_or(false)
        })
        .expect("export file not found")
}

#[test]
fn test_cli_help() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Medication intake tracker"));
}

#[test]
fn test_add_and_list_medication() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    add_medication(
        data_dir,
        &["Doliprane 1000mg", "--note", "Maximum 4 par 24h", "--delay", "6"],
    );

    cli(data_dir)
        .args(["med", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Doliprane 1000mg"))
        .stdout(predicate::str::contains("Maximum 4 par 24h"))
        .stdout(predicate::str::contains("6h"));

    let meds = read_entry(data_dir, "medications");
    let (key, record) = meds.as_object().unwrap().iter().next().unwrap();
    assert_eq!(record["uuid"], Value::String(key.clone()));
    assert_eq!(record["delay"], 6.0);
}

#[test]
fn test_empty_name_rejected_at_form_boundary() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir)
        .args(["med", "add", "  "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Validation"));

    assert!(!data_dir.join("store/medications.json").exists());
}

#[test]
fn test_edit_keeps_unspecified_fields() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add_medication(data_dir, &["Spasfon", "--note", "2 max", "--color", "#e91e63"]);

    cli(data_dir)
        .args(["med", "edit", "spasfon", "--delay", "4"])
        .assert()
        .success();

    let meds = read_entry(data_dir, "medications");
    let record = meds.as_object().unwrap().values().next().unwrap().clone();
    assert_eq!(record["secondary"], "2 max");
    assert_eq!(record["color"], "#e91e63");
    assert_eq!(record["delay"], 4.0);

    cli(data_dir)
        .args(["med", "edit", "spasfon", "--clear-note"])
        .assert()
        .success();
    let meds = read_entry(data_dir, "medications");
    let record = meds.as_object().unwrap().values().next().unwrap().clone();
    assert!(record.get("secondary").is_none());
}

#[test]
fn test_take_records_snapshot() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add_medication(data_dir, &["Doliprane", "--color", "#2196f3"]);

    cli(data_dir)
        .args(["take", "doliprane"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Took Doliprane"));

    let shots = read_entry(data_dir, "shots");
    let shot = shots.as_object().unwrap().values().next().unwrap().clone();
    assert_eq!(shot["primary"], "Doliprane");
    assert_eq!(shot["color"], "#2196f3");
    assert!(shot["ts"].as_i64().unwrap() > 0);
}

#[test]
fn test_take_unknown_medication_fails() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .args(["take", "nothing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NotFound"));
}

#[test]
fn test_take_within_delay_warns() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add_medication(data_dir, &["Ibuprofen", "--delay", "8"]);

    cli(data_dir).args(["take", "Ibuprofen"]).assert().success();
    cli(data_dir)
        .args(["take", "Ibuprofen"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Minimum delay not elapsed"));

    let shots = read_entry(data_dir, "shots");
    assert_eq!(shots.as_object().unwrap().len(), 2);
}

#[test]
fn test_deleting_medication_keeps_shots() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add_medication(data_dir, &["Spasfon"]);
    cli(data_dir).args(["take", "Spasfon"]).assert().success();

    cli(data_dir)
        .args(["med", "rm", "Spasfon"])
        .assert()
        .success();

    cli(data_dir)
        .args(["shot", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Spasfon"));
    assert!(read_entry(data_dir, "medications")
        .as_object()
        .unwrap()
        .is_empty());
}

#[test]
fn test_shot_edit_with_datetime() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add_medication(data_dir, &["A"]);
    cli(data_dir).args(["take", "A"]).assert().success();
    let shot_id = only_shot_id(data_dir);

    cli(data_dir)
        .args(["shot", "edit", &shot_id[..8], "2024-01-02T08:30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-01-02 08:30"));

    cli(data_dir)
        .args(["shot", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-01-02 08:30"));
}

#[test]
fn test_shot_edit_time_of_day_never_in_future() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add_medication(data_dir, &["A"]);
    cli(data_dir).args(["take", "A"]).assert().success();
    let shot_id = only_shot_id(data_dir);

    cli(data_dir)
        .args(["shot", "edit", &shot_id, "23:59"])
        .assert()
        .success();

    let shots = read_entry(data_dir, "shots");
    let ts = shots[&shot_id]["ts"].as_i64().unwrap();
    assert!(ts <= chrono::Utc::now().timestamp_millis());
}

#[test]
fn test_shot_edit_future_datetime_refused() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add_medication(data_dir, &["A"]);
    cli(data_dir).args(["take", "A"]).assert().success();
    let shot_id = only_shot_id(data_dir);
    let before = read_entry(data_dir, "shots")[&shot_id]["ts"].clone();

    cli(data_dir)
        .args(["shot", "edit", &shot_id, "2999-01-01T00:00"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("FutureTimestamp"));

    assert_eq!(read_entry(data_dir, "shots")[&shot_id]["ts"], before);
}

#[test]
fn test_shot_rm() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add_medication(data_dir, &["A"]);
    cli(data_dir).args(["take", "A"]).assert().success();
    let shot_id = only_shot_id(data_dir);

    cli(data_dir)
        .args(["shot", "rm", &shot_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted shot"));

    cli(data_dir)
        .args(["shot", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing yet"));
}

#[test]
fn test_view_mode_persists() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add_medication(data_dir, &["A"]);
    add_medication(data_dir, &["B"]);

    cli(data_dir).args(["view", "button"]).assert().success();
    assert_eq!(read_entry(data_dir, "medicViewMode"), "button");

    cli(data_dir)
        .args(["med", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[ A ] [ B ]"));
}

#[test]
fn test_export_then_import_roundtrip() {
    let source = setup_test_dir();
    let target = setup_test_dir();
    let exports = setup_test_dir();

    add_medication(source.path(), &["Doliprane", "--delay", "6", "--note", "max 4"]);
    add_medication(source.path(), &["Spasfon"]);
    cli(source.path()).args(["take", "Doliprane"]).assert().success();

    cli(source.path())
        .arg("export")
        .arg("--out-dir")
        .arg(exports.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 medications and 1 shots"));

    let export_path = find_export(exports.path());
    let exported: Value = serde_json::from_str(&fs::read_to_string(&export_path).unwrap()).unwrap();
    assert_eq!(exported["medications"].as_array().unwrap().len(), 2);
    assert!(exported["medications"][0]["uuid"].is_string());

    add_medication(target.path(), &["Will be replaced"]);
    cli(target.path())
        .arg("import")
        .arg(&export_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 medications, 1 shots"));

    cli(target.path())
        .args(["med", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Doliprane"))
        .stdout(predicate::str::contains("Spasfon"))
        .stdout(predicate::str::contains("Will be replaced").not());

    let source_ids: Vec<String> = read_entry(source.path(), "medications")
        .as_object()
        .unwrap()
        .keys()
        .cloned()
        .collect();
    let target_meds = read_entry(target.path(), "medications");
    for key in target_meds.as_object().unwrap().keys() {
        assert!(!source_ids.contains(key), "import must assign fresh ids");
    }
}

#[test]
fn test_import_isolates_bad_files() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let good = data_dir.join("good.json");
    let broken = data_dir.join("broken.json");
    let notes = data_dir.join("notes.txt");
    fs::write(&good, r#"{"medications":[{"primary":"Imported","delay":"6"}]}"#).unwrap();
    fs::write(&broken, "{ invalid").unwrap();
    fs::write(&notes, r#"{"shots":[]}"#).unwrap();

    cli(data_dir)
        .arg("import")
        .arg(&broken)
        .arg(&good)
        .arg(&notes)
        .assert()
        .success()
        .stderr(predicate::str::contains("broken.json"))
        .stderr(predicate::str::contains("only .json files"));

    cli(data_dir)
        .args(["med", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported"));
}

#[test]
fn test_import_fails_when_nothing_applies() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let empty = data_dir.join("empty.json");
    fs::write(&empty, r#"{"settings":{}}"#).unwrap();

    cli(data_dir)
        .arg("import")
        .arg(&empty)
        .assert()
        .failure()
        .stderr(predicate::str::contains("neither"));
}

#[test]
fn test_import_list_appends() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add_medication(data_dir, &["Existing"]);

    let list = data_dir.join("list.tsv");
    fs::write(&list, "Doliprane\tmax 4\t#2196f3\t6\r\nSpasfon\r\n").unwrap();

    cli(data_dir)
        .arg("import-list")
        .arg(&list)
        .assert()
        .success()
        .stdout(predicate::str::contains("Added 2 medications"));

    assert_eq!(
        read_entry(data_dir, "medications").as_object().unwrap().len(),
        3
    );
}

#[test]
fn test_status_is_default_command() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No medications yet"))
        .stdout(predicate::str::contains("Latest shots"));
}

#[test]
fn test_sequential_runs_accumulate_shots() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add_medication(data_dir, &["Vitamin D"]);

    for _ in 0..5 {
        cli(data_dir).args(["take", "Vitamin D"]).assert().success();
    }

    let shots = read_entry(data_dir, "shots");
    assert_eq!(shots.as_object().unwrap().len(), 5);
}

#[test]
fn test_extreme_values_do_not_break_status() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let file = data_dir.join("extreme.json");
    fs::write(
        &file,
        r#"{"medications":[{"primary":"A","delay":1e12}],
            "shots":[{"ts":-9223372036854775808,"primary":"A"},
                     {"ts":9223372036854775807,"primary":"A"},
                     {"ts":1700000000000,"primary":"A"}]}"#,
    )
    .unwrap();

    cli(data_dir).arg("import").arg(&file).assert().success();

    cli(data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Latest shots"));
    cli(data_dir).args(["shot", "list"]).assert().success();
    cli(data_dir).args(["take", "A"]).assert().success();
}
