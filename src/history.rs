//! Notification history and reporting.
//!
//! Stores one record per orchestrated notification in JSONL files at
//! `~/.session-bell-history/{date}.jsonl`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub fn default_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".session-bell-history")
}

fn history_file(dir: &Path, date: &str) -> PathBuf {
    dir.join(format!("{date}.jsonl"))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: String,
    pub transaction_id: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub duration_ms: i64,
    pub channels_ok: usize,
    pub channels_failed: usize,
}

pub fn now_timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

pub fn save_record(dir: &Path, record: &HistoryRecord) {
    if let Err(e) = fs::create_dir_all(dir) {
        warn!("Failed to create history dir: {e}");
        return;
    }

    let date = Local::now().format("%Y-%m-%d").to_string();
    let path = history_file(dir, &date);

    let mut file = match fs::OpenOptions::new().create(true).append(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Failed to open history file: {e}");
            return;
        }
    };

    match serde_json::to_string(record) {
        Ok(line) => {
            if let Err(e) = writeln!(file, "{line}") {
                warn!("Failed to write history record: {e}");
            }
        }
        Err(e) => warn!("Failed to serialize history record: {e}"),
    }
}

pub fn load_records(dir: &Path, date: &str) -> Vec<HistoryRecord> {
    let path = history_file(dir, date);
    let contents = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    contents
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}
