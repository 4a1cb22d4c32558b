//! Built-in mentor roster and JSON roster files.
//!
//! The sign ships with the studio's current weekly roster. A replacement can
//! be supplied as a JSON array of shifts:
//!
//! ```json
//! [
//!   { "weekday": "Mon", "start": "14:00", "name": "Christina H" },
//!   { "weekday": "Thu", "start": "14:30", "minutes": 90, "name": "Jason Y" }
//! ]
//! ```
//!
//! `minutes` defaults to [`DEFAULT_SHIFT_MINUTES`].

use super::{MentorShift, ScheduleError, ScheduleTable};
use chrono::{NaiveTime, TimeDelta, Timelike, Weekday};
use log::info;
use serde::Deserialize;
use std::path::Path;

/// Length of a regular mentor shift.
pub const DEFAULT_SHIFT_MINUTES: i64 = 120;

const BUILT_IN: &[(Weekday, u32, u32, &str)] = &[
    (Weekday::Sun, 16, 0, "Brayden A"),
    (Weekday::Sun, 17, 0, "Sofia R"),
    (Weekday::Sun, 18, 0, "Edward D"),
    (Weekday::Sun, 20, 0, "Xue Ye L"),
    (Weekday::Mon, 14, 0, "Christina H"),
    (Weekday::Mon, 16, 0, "Sabina S"),
    (Weekday::Mon, 18, 0, "Lin L"),
    (Weekday::Mon, 20, 0, "Tristan I"),
    (Weekday::Tue, 12, 0, "Joey H"),
    (Weekday::Tue, 16, 0, "Sophia Z"),
    (Weekday::Tue, 17, 0, "Sam S"),
    (Weekday::Tue, 18, 0, "Emily Mc"),
    (Weekday::Tue, 20, 0, "Diandry R"),
    (Weekday::Wed, 12, 0, "Sameer P"),
    (Weekday::Wed, 14, 0, "Swapnil P"),
    (Weekday::Wed, 16, 0, "Amaury P"),
    (Weekday::Wed, 17, 0, "Zach S"),
    (Weekday::Wed, 18, 0, "David L"),
    (Weekday::Wed, 19, 0, "Paolo D"),
    (Weekday::Wed, 20, 0, "Josh P"),
    (Weekday::Thu, 14, 30, "Jason Y"),
    (Weekday::Thu, 16, 0, "Olivia C"),
    (Weekday::Thu, 18, 0, "Emily Mar."),
    (Weekday::Thu, 19, 0, "Patia F"),
    (Weekday::Thu, 20, 0, "Amy C"),
    (Weekday::Fri, 12, 0, "Alex S"),
    (Weekday::Fri, 13, 0, "Will R"),
    (Weekday::Fri, 14, 0, "Jack M"),
    (Weekday::Fri, 16, 0, "Nick B"),
];

/// The roster compiled into the binary.
pub fn built_in() -> Result<ScheduleTable, ScheduleError> {
    BUILT_IN
        .iter()
        .map(|&(weekday, hour, minute, name)| {
            MentorShift::new(
                weekday,
                hour,
                minute,
                TimeDelta::minutes(DEFAULT_SHIFT_MINUTES),
                name,
            )
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct RawShift {
    weekday: Weekday,
    start: String,
    #[serde(default = "default_minutes")]
    minutes: i64,
    name: String,
}

fn default_minutes() -> i64 {
    DEFAULT_SHIFT_MINUTES
}

impl TryFrom<RawShift> for MentorShift {
    type Error = ScheduleError;

    fn try_from(raw: RawShift) -> Result<Self, Self::Error> {
        let start = NaiveTime::parse_from_str(raw.start.trim(), "%H:%M").map_err(|_| {
            ScheduleError::UnparseableStart {
                name: raw.name.clone(),
                start: raw.start.clone(),
            }
        })?;
        MentorShift::new(
            raw.weekday,
            start.hour(),
            start.minute(),
            TimeDelta::minutes(raw.minutes),
            raw.name,
        )
    }
}

/// Parse a JSON roster. Every entry must be a valid shift.
pub fn parse(json: &str) -> Result<ScheduleTable, ScheduleError> {
    let raw: Vec<RawShift> = serde_json::from_str(json)?;
    raw.into_iter().map(MentorShift::try_from).collect()
}

/// Load a JSON roster from disk.
pub fn load(path: &Path) -> Result<ScheduleTable, ScheduleError> {
    let content = std::fs::read_to_string(path)?;
    let table = parse(&content)?;
    info!("Loaded {} shifts from {}", table.len(), path.display());
    Ok(table)
}
