use std::fmt;
use std::fs;

use chrono::{Local, TimeZone};
use tempfile::TempDir;
use tracing_log_envelope::init::{Logger, LoggerConfig};
use tracing_log_envelope::response::{Responder, ResponseStatus};
use tracing_log_envelope::rotation::{RotatingFileHandler, RotationConfig};
use tracing_log_envelope::CallerLocation;

#[derive(Debug)]
struct Io;

impl fmt::Display for Io {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("disk quota exceeded")
    }
}

impl std::error::Error for Io {}

#[derive(Debug)]
struct Save(Io);

impl fmt::Display for Save {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("could not save report")
    }
}

impl std::error::Error for Save {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

fn file_logger(temp_dir: &TempDir, backup_count: usize) -> Responder {
    let config = LoggerConfig {
        rotation: RotationConfig {
            dir: temp_dir.path().join("log"),
            backup_count,
            ..RotationConfig::default()
        },
        ..LoggerConfig::default()
    };
    Responder::new(Logger::build("app", &config).unwrap())
}

#[test]
fn critical_envelope_writes_error_chain() {
    let temp_dir = TempDir::new().unwrap();
    let responder = file_logger(&temp_dir, 7);
    let caller = CallerLocation::new("reports.rs", "save_report");

    let err = Save(Io);
    let resp = responder.respond_err::<()>(&caller, ResponseStatus::Critical, "report lost", None, &err);
    assert_eq!(resp.status, ResponseStatus::Critical);
    responder.logger().flush().unwrap();

    let content = fs::read_to_string(temp_dir.path().join("log").join("Today.log")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with(" - CRITICAL - reports.rs - save_report - report lost"));
    assert_eq!(lines[1], "Caused by: could not save report");
    assert_eq!(lines[2], "Caused by: disk quota exceeded");
}

#[test]
fn rollover_keeps_retention_count() {
    let temp_dir = TempDir::new().unwrap();
    let log_dir = temp_dir.path().join("log");
    fs::create_dir_all(&log_dir).unwrap();

    for day in 1..=7 {
        fs::write(log_dir.join(format!("202401{:02}.log", day)), "old\n").unwrap();
    }

    let config = RotationConfig {
        dir: log_dir.clone(),
        backup_count: 7,
        ..RotationConfig::default()
    };
    let opened = Local.with_ymd_and_hms(2024, 1, 8, 22, 0, 0).unwrap();
    let mut handler = RotatingFileHandler::new_at(config, opened).unwrap();

    handler
        .emit_at("2024-01-08 22:00:00,000 - INFO - jobs.rs - nightly - job done", opened)
        .unwrap();
    handler
        .rollover_at(Local.with_ymd_and_hms(2024, 1, 9, 1, 0, 0).unwrap())
        .unwrap();

    assert_eq!(handler.rotated_files().unwrap().len(), 7);
    assert!(!log_dir.join("20240101.log").exists());
    assert!(log_dir.join("20240102.log").exists());
    assert!(fs::read_to_string(log_dir.join("20240108.log"))
        .unwrap()
        .ends_with("nightly - job done\n"));
    assert!(!log_dir.join("Today.log").exists());
}

#[test]
fn eight_rotated_files_are_pruned_to_seven() {
    let temp_dir = TempDir::new().unwrap();
    let log_dir = temp_dir.path().join("log");
    let responder = file_logger(&temp_dir, 7);

    for day in 1..=8 {
        fs::write(log_dir.join(format!("202401{:02}.log", day)), "old\n").unwrap();
    }

    let handler = responder.logger().file_handler().unwrap();
    handler.with(|h| h.rollover()).unwrap();

    let mut remaining: Vec<String> = fs::read_dir(&log_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    remaining.sort();
    let expected: Vec<String> = (2..=8).map(|day| format!("202401{:02}.log", day)).collect();
    assert_eq!(remaining, expected);
}

#[test]
fn retention_disabled_never_prunes() {
    let temp_dir = TempDir::new().unwrap();
    let log_dir = temp_dir.path().join("log");
    let responder = file_logger(&temp_dir, 0);

    for day in 1..=20 {
        fs::write(log_dir.join(format!("202401{:02}.log", day)), "old\n").unwrap();
    }

    let handler = responder.logger().file_handler().unwrap();
    for _ in 0..5 {
        handler.with(|h| h.rollover()).unwrap();
    }

    assert_eq!(handler.with(|h| h.rotated_files()).unwrap().len(), 20);
}
