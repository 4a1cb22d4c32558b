//! Open/closed decision and subtitle text.
//!
//! | Switch | Open when |
//! |---|---|
//! | ForcedClosed | never |
//! | ForcedOpen | the door is open |
//! | Scheduled | a mentor is on duty and the door is open |
//!
//! The door gates even the forced-open override so a switch left in position
//! II overnight doesn't advertise a locked studio as open.

use crate::schedule::{MentorShift, ScheduleTable};
use crate::sensors::SwitchPosition;
use chrono::{NaiveDateTime, NaiveTime};

/// Subtitle when the sign is closed on schedule but won't guess a reopen time.
pub const UNKNOWN_MARKER: &str = "?";

/// Joins the names of concurrent mentors.
pub const MENTOR_SEPARATOR: &str = " & ";

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub is_open: bool,
    pub subtitle: String,
}

/// The open/closed truth table. Pure.
pub fn decide(switch: SwitchPosition, door_open: bool, on_duty: &[&MentorShift]) -> bool {
    match switch {
        SwitchPosition::ForcedClosed => false,
        SwitchPosition::ForcedOpen => door_open,
        SwitchPosition::Scheduled => !on_duty.is_empty() && door_open,
    }
}

/// Subtitle shown under the title.
///
/// - open on schedule: the on-duty mentor names
/// - closed on schedule: the start of the next shift batch today, or
///   [`UNKNOWN_MARKER`] when nothing else starts today or when a mentor is
///   scheduled right now but the door is shut (a missed shift)
/// - overrides: empty
pub fn subtitle(
    switch: SwitchPosition,
    is_open: bool,
    on_duty: &[&MentorShift],
    next_today: &[&MentorShift],
) -> String {
    if switch != SwitchPosition::Scheduled {
        return String::new();
    }
    if is_open {
        return join_names(on_duty);
    }
    match next_today.first() {
        Some(next) if on_duty.is_empty() => format_start(next.start()),
        _ => UNKNOWN_MARKER.to_string(),
    }
}

/// Query the roster for `now` and apply [`decide`] and [`subtitle`].
pub fn evaluate(
    schedule: &ScheduleTable,
    switch: SwitchPosition,
    door_open: bool,
    now: NaiveDateTime,
) -> Decision {
    let on_duty = schedule.mentors_on_duty(now);
    let is_open = decide(switch, door_open, &on_duty);
    let next_today = if switch == SwitchPosition::Scheduled && !is_open {
        schedule.next_shifts_today(now)
    } else {
        Vec::new()
    };
    Decision {
        is_open,
        subtitle: subtitle(switch, is_open, &on_duty, &next_today),
    }
}

pub fn join_names(shifts: &[&MentorShift]) -> String {
    shifts
        .iter()
        .map(|s| s.name())
        .collect::<Vec<_>>()
        .join(MENTOR_SEPARATOR)
}

/// 12-hour clock without a leading zero, e.g. `2:30PM`.
pub fn format_start(start: NaiveTime) -> String {
    start.format("%-I:%M%p").to_string()
}

/// Parse a time produced by [`format_start`].
pub fn parse_start(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%I:%M%p").ok()
}

/// Label in front of a mentor subtitle, pluralized when it lists several names.
pub fn mentor_label(subtitle: &str, on_duty_text: bool) -> &'static str {
    let several = subtitle.contains(MENTOR_SEPARATOR);
    match (on_duty_text, several) {
        (true, false) => "Mentor on Duty: ",
        (true, true) => "Mentors on Duty: ",
        (false, false) => "Mentor: ",
        (false, true) => "Mentors: ",
    }
}
