//! Weekly mentor roster and duty queries.
//!
//! A [`ScheduleTable`] is a fixed set of [`MentorShift`]s that recur every
//! week. Each shift lives entirely within one day: it starts at a wall-clock
//! time on its weekday and ends before (or exactly at) the next midnight.
//!
//! All queries take a local [`NaiveDateTime`] and only look at the weekday and
//! time-of-day of that instant. A shift covers the half-open interval
//! `[start, start + duration)`, so the exact start instant is "on duty" and the
//! exact end instant is not.

pub mod roster;

use chrono::{Datelike, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Weekday};
use serde::Serialize;
use thiserror::Error;

/// Errors raised while building a roster.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid start time {hour:02}:{minute:02} for {name}")]
    InvalidStart { name: String, hour: u32, minute: u32 },

    #[error("unparseable start time {start:?} for {name}")]
    UnparseableStart { name: String, start: String },

    #[error("shift for {name} has a non-positive duration")]
    EmptyShift { name: String },

    #[error("shift for {name} on {weekday} runs past midnight")]
    CrossesMidnight { name: String, weekday: Weekday },

    #[error("failed to read roster file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse roster file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One recurring duty slot for one mentor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MentorShift {
    weekday: Weekday,
    start: NaiveTime,
    #[serde(serialize_with = "serialize_minutes")]
    duration: TimeDelta,
    name: String,
}

fn serialize_minutes<S: serde::Serializer>(d: &TimeDelta, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i64(d.num_minutes())
}

impl MentorShift {
    /// Build a shift, rejecting start times that don't exist and shifts that
    /// would spill into the following day.
    pub fn new(
        weekday: Weekday,
        hour: u32,
        minute: u32,
        duration: TimeDelta,
        name: impl Into<String>,
    ) -> Result<Self, ScheduleError> {
        let name = name.into();
        let start = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
            ScheduleError::InvalidStart {
                name: name.clone(),
                hour,
                minute,
            }
        })?;
        if duration <= TimeDelta::zero() {
            return Err(ScheduleError::EmptyShift { name });
        }
        let until_midnight =
            TimeDelta::days(1) - TimeDelta::seconds(i64::from(start.num_seconds_from_midnight()));
        if duration > until_midnight {
            return Err(ScheduleError::CrossesMidnight { name, weekday });
        }
        Ok(Self {
            weekday,
            start,
            duration,
            name,
        })
    }

    pub fn weekday(&self) -> Weekday {
        self.weekday
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn duration(&self) -> TimeDelta {
        self.duration
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `at` falls inside `[start, start + duration)` on this shift's weekday.
    pub fn is_active_at(&self, at: NaiveDateTime) -> bool {
        if at.weekday() != self.weekday {
            return false;
        }
        let offset = at.time().signed_duration_since(self.start);
        offset >= TimeDelta::zero() && offset < self.duration
    }
}

/// The full weekly roster. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct ScheduleTable {
    shifts: Vec<MentorShift>,
}

impl ScheduleTable {
    pub fn new(shifts: Vec<MentorShift>) -> Self {
        Self { shifts }
    }

    pub fn shifts(&self) -> &[MentorShift] {
        &self.shifts
    }

    pub fn len(&self) -> usize {
        self.shifts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
    }

    fn on_weekday(&self, weekday: Weekday) -> impl Iterator<Item = &MentorShift> {
        self.shifts.iter().filter(move |s| s.weekday == weekday)
    }

    /// Every shift covering `now`, in table order.
    pub fn mentors_on_duty(&self, now: NaiveDateTime) -> Vec<&MentorShift> {
        self.on_weekday(now.weekday())
            .filter(|s| s.is_active_at(now))
            .collect()
    }

    /// The batch of shifts that start together at the earliest start time
    /// strictly after `now` on the same day, in table order.
    ///
    /// Empty when nothing else starts today.
    pub fn next_shifts_today(&self, now: NaiveDateTime) -> Vec<&MentorShift> {
        let time = now.time();
        let Some(next_start) = self
            .on_weekday(now.weekday())
            .map(|s| s.start)
            .filter(|start| *start > time)
            .min()
        else {
            return Vec::new();
        };
        self.on_weekday(now.weekday())
            .filter(|s| s.start == next_start)
            .collect()
    }
}

impl FromIterator<MentorShift> for ScheduleTable {
    fn from_iter<I: IntoIterator<Item = MentorShift>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
