//! Append-only activity log.
//!
//! One CSV line per sample:
//!
//! ```text
//! 2024-01-01T15:00:00.123-06:00,true,Scheduled,false
//! ```
//!
//! Older logs carry the switch position as a number (`0`/`1`/`2`); those lines
//! still parse.

use crate::sensors::SwitchPosition;
use crate::sign::SignState;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use log::{info, warn};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActivityRecordError {
    #[error("expected 4 fields, found {0}")]
    FieldCount(usize),

    #[error("bad timestamp {0:?}")]
    Timestamp(String),

    #[error("bad boolean {0:?}")]
    Bool(String),

    #[error("bad switch position {0:?}")]
    SwitchPosition(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub timestamp: DateTime<FixedOffset>,
    pub is_open: bool,
    pub switch_position: SwitchPosition,
    pub motion: bool,
}

impl ActivityRecord {
    pub fn from_state(state: &SignState, timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            timestamp,
            is_open: state.is_open(),
            switch_position: state.switch_position(),
            motion: state.motion_detected(),
        }
    }

    /// The CSV line, newline included.
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{}\n",
            self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, false),
            self.is_open,
            self.switch_position,
            self.motion
        )
    }
}

impl FromStr for ActivityRecord {
    type Err = ActivityRecordError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.trim().split(',').collect();
        let [timestamp, is_open, switch, motion] = fields[..] else {
            return Err(ActivityRecordError::FieldCount(fields.len()));
        };
        let timestamp = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|_| ActivityRecordError::Timestamp(timestamp.to_string()))?;
        let switch_position = switch
            .parse::<SwitchPosition>()
            .ok()
            .or_else(|| switch.parse::<u8>().ok().and_then(SwitchPosition::from_legacy_code))
            .ok_or_else(|| ActivityRecordError::SwitchPosition(switch.to_string()))?;
        Ok(Self {
            timestamp,
            is_open: parse_bool(is_open)?,
            switch_position,
            motion: parse_bool(motion)?,
        })
    }
}

fn parse_bool(field: &str) -> Result<bool, ActivityRecordError> {
    field
        .parse()
        .map_err(|_| ActivityRecordError::Bool(field.to_string()))
}

/// The log file, opened for appending. Writers are serialized.
pub struct ActivityLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ActivityLog {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .mode(0o600)
            .open(&path)?;
        info!("[Log] Appending activity to {}", path.display());
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &ActivityRecord) -> io::Result<()> {
        let mut file = self.file.lock();
        file.write_all(record.to_line().as_bytes())
    }
}

/// Every well-formed record in the file at `path`. Malformed lines are skipped.
pub fn read_records(path: &Path) -> io::Result<Vec<ActivityRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    let mut skipped = 0usize;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match line.parse() {
            Ok(record) => records.push(record),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("[Log] Skipped {} malformed lines in {}", skipped, path.display());
    }
    Ok(records)
}
