#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

use pagelog::primitives::io::StdFileIo;
use pagelog::primitives::wal::{LogOptions, RedoLog};
use pagelog::types::{Lsn, PageId, PartitionId};
use pagelog::{InitDataPageRecord, InsertFragmentRecord, InsertRowRecord};

fn setup_log(name: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join(format!("{name}.log"));
    seed_log(&path).expect("seed log");
    (dir, path)
}

fn seed_log(path: &Path) -> pagelog::types::Result<()> {
    let log = RedoLog::open(
        Arc::new(StdFileIo::open(path)?),
        LogOptions::new(1024, 9, Lsn(40)),
    )?;
    let part = PartitionId(2);
    log.append(&InitDataPageRecord::new(part, PageId(5), 1).into())?;
    log.append(&InsertRowRecord::new(part, PageId(5), &b"hello"[..]).into())?;
    log.append(&InsertFragmentRecord::new(part, PageId(6), vec![0xAB, 0xCD, 0xEF], 42).into())?;
    log.sync()
}

#[test]
fn dump_json_lists_records() {
    let (_dir, path) = setup_log("dump");
    let output = cargo_bin_cmd!("pagelog")
        .args(["--format", "json", "dump"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["page_size"], 1024);
    let records = json["records"].as_array().expect("records array");
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["lsn"], 40);
    assert_eq!(records[1]["payload_hex"], "68656c6c6f");
    assert_eq!(records[2]["record_type"], "insert_fragment");
    assert_eq!(records[2]["last_link"], 42);
    assert_eq!(records[2]["payload_hex"], "abcdef");
}

#[test]
fn dump_text_respects_limit() {
    let (_dir, path) = setup_log("limit");
    let output = cargo_bin_cmd!("pagelog")
        .args(["dump", "--limit", "1"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("init_data_page"));
    assert!(!text.contains("insert_row"));
    assert!(text.contains("limited to 1 records"));
}

#[test]
fn stats_json_counts_types() {
    let (_dir, path) = setup_log("stats");
    let output = cargo_bin_cmd!("pagelog")
        .args(["--format", "json", "stats"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["records"], 3);
    assert_eq!(json["first_lsn"], 40);
    assert_eq!(json["last_lsn"], 42);
    assert_eq!(json["pages_touched"], 2);
    assert_eq!(json["by_type"]["insert_fragment"], 1);
    assert_eq!(json["torn_tail_bytes"], 0);
}

#[test]
fn missing_log_fails() {
    let dir = TempDir::new().expect("tempdir");
    cargo_bin_cmd!("pagelog")
        .arg("stats")
        .arg(dir.path().join("absent.log"))
        .assert()
        .failure();
}
