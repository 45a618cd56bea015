//! NS-015: Append-only JSONL run event log.
//!
//! One line per event in `<output_dir>/events.jsonl`. Appends from parallel
//! host workers are serialized behind a mutex.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Event log file name inside the output directory.
pub const EVENT_LOG_FILE: &str = "events.jsonl";

/// Run event for the JSONL event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        hosts: usize,
        netsnap_version: String,
    },
    HostStarted {
        run_id: String,
        host: String,
        commands: usize,
    },
    HostCompleted {
        run_id: String,
        host: String,
        commands: usize,
        duration_seconds: f64,
    },
    HostFailed {
        run_id: String,
        host: String,
        error: String,
    },
    RunCompleted {
        run_id: String,
        succeeded: usize,
        failed: usize,
        total_seconds: f64,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: RunEvent,
}

/// ISO 8601 UTC timestamp, second precision.
pub fn now_iso8601() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

/// Generate a run ID.
pub fn generate_run_id() -> String {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default() as u64;
    format!("r-{:012x}", nanos & 0xFFFF_FFFF_FFFF)
}

/// Derive the event log path for an output directory.
pub fn event_log_path(output_dir: &Path) -> PathBuf {
    output_dir.join(EVENT_LOG_FILE)
}

/// Open handle on a run's event log.
#[derive(Debug)]
pub struct EventLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl EventLog {
    /// Open (or create) `events.jsonl` in `output_dir` for appending.
    pub fn open(output_dir: &Path) -> Result<Self> {
        let path = event_log_path(output_dir);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| Error::EventLog {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a single JSON line.
    pub fn append(&self, event: RunEvent) -> std::io::Result<()> {
        let te = TimestampedEvent {
            ts: now_iso8601(),
            event,
        };
        let mut line = serde_json::to_string(&te)?;
        line.push('\n');

        // A poisoned lock only means another writer panicked mid-append.
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(line.as_bytes())
    }

    /// Append, logging instead of failing. Event log trouble never aborts a run.
    pub fn record(&self, event: RunEvent) {
        if let Err(e) = self.append(event) {
            tracing::warn!(path = %self.path.display(), error = %e, "event log append failed");
        }
    }
}

/// Read every event back from a log file.
pub fn read_events(path: &Path) -> std::io::Result<Vec<TimestampedEvent>> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(std::io::Error::from))
        .collect()
}
