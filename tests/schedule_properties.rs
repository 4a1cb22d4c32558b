//! Property tests for roster queries, the open/closed decision and the
//! activity log line format.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday};
use open_sign::output::activity_log::ActivityRecord;
use open_sign::schedule::{MentorShift, ScheduleTable};
use open_sign::sensors::SwitchPosition;
use open_sign::sign::decision::{self, UNKNOWN_MARKER};
use proptest::prelude::*;

const NAMES: [&str; 5] = ["Alice", "Bob", "Carol", "Dave", "Erin"];

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn arb_shift() -> impl Strategy<Value = MentorShift> {
    (0usize..7, 0u32..24, 0u32..60, 1i64..=24 * 60, 0usize..NAMES.len()).prop_map(
        |(day, hour, minute, minutes, name)| {
            let until_midnight = 24 * 60 - i64::from(hour * 60 + minute);
            let duration = TimeDelta::minutes(1 + (minutes - 1) % until_midnight);
            MentorShift::new(
                WEEKDAYS[day],
                hour,
                minute,
                duration,
                NAMES[name],
            )
            .unwrap()
        },
    )
}

fn arb_table() -> impl Strategy<Value = ScheduleTable> {
    proptest::collection::vec(arb_shift(), 0..12).prop_map(ScheduleTable::new)
}

/// Any second of the week of 2024-01-01 (a Monday).
fn arb_instant() -> impl Strategy<Value = NaiveDateTime> {
    (0i64..7 * 24 * 3600).prop_map(|second| {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_time(NaiveTime::MIN)
            + TimeDelta::seconds(second)
    })
}

fn arb_switch() -> impl Strategy<Value = SwitchPosition> {
    prop_oneof![
        Just(SwitchPosition::Scheduled),
        Just(SwitchPosition::ForcedOpen),
        Just(SwitchPosition::ForcedClosed),
    ]
}

fn covers(shift: &MentorShift, now: NaiveDateTime) -> bool {
    let offset = now.time() - shift.start();
    shift.weekday() == now.weekday() && offset >= TimeDelta::zero() && offset < shift.duration()
}

proptest! {
    /// On-duty is exactly the shifts covering `now`, kept in table order.
    #[test]
    fn on_duty_matches_interval_membership(table in arb_table(), now in arb_instant()) {
        let expected: Vec<&MentorShift> =
            table.shifts().iter().filter(|s| covers(s, now)).collect();
        prop_assert_eq!(table.mentors_on_duty(now), expected);
    }

    /// The next batch shares one start, the earliest one later today.
    #[test]
    fn next_batch_is_earliest_later_start(table in arb_table(), now in arb_instant()) {
        let later_today: Vec<&MentorShift> = table
            .shifts()
            .iter()
            .filter(|s| s.weekday() == now.weekday() && s.start() > now.time())
            .collect();
        let batch = table.next_shifts_today(now);

        prop_assert_eq!(batch.is_empty(), later_today.is_empty());
        if let Some(first) = batch.first() {
            let earliest = later_today.iter().map(|s| s.start()).min().unwrap();
            prop_assert_eq!(first.start(), earliest);
            prop_assert!(batch.iter().all(|s| s.start() == earliest));
            let whole_batch = later_today.iter().filter(|s| s.start() == earliest).count();
            prop_assert_eq!(batch.len(), whole_batch);
        }
    }

    /// Open requires an open door and a switch not in ForcedClosed, and
    /// on schedule additionally a mentor on duty.
    #[test]
    fn decision_truth_table(
        table in arb_table(),
        now in arb_instant(),
        switch in arb_switch(),
        door_open in any::<bool>(),
    ) {
        let on_duty = table.mentors_on_duty(now);
        let open = decision::decide(switch, door_open, &on_duty);
        let expected = match switch {
            SwitchPosition::ForcedClosed => false,
            SwitchPosition::ForcedOpen => door_open,
            SwitchPosition::Scheduled => door_open && !on_duty.is_empty(),
        };
        prop_assert_eq!(open, expected);
    }

    /// Same inputs, same decision.
    #[test]
    fn evaluate_is_idempotent(
        table in arb_table(),
        now in arb_instant(),
        switch in arb_switch(),
        door_open in any::<bool>(),
    ) {
        let first = decision::evaluate(&table, switch, door_open, now);
        let second = decision::evaluate(&table, switch, door_open, now);
        prop_assert_eq!(first, second);
    }

    /// Overrides never carry a subtitle; closed on schedule always carries one.
    #[test]
    fn subtitle_shape(
        table in arb_table(),
        now in arb_instant(),
        switch in arb_switch(),
        door_open in any::<bool>(),
    ) {
        let outcome = decision::evaluate(&table, switch, door_open, now);
        match (switch, outcome.is_open) {
            (SwitchPosition::Scheduled, true) => {
                let names = decision::join_names(&table.mentors_on_duty(now));
                prop_assert_eq!(outcome.subtitle, names);
            }
            (SwitchPosition::Scheduled, false) => {
                prop_assert!(
                    outcome.subtitle == UNKNOWN_MARKER
                        || decision::parse_start(&outcome.subtitle).is_some(),
                    "unexpected subtitle {:?}",
                    outcome.subtitle
                );
            }
            _ => {
                prop_assert_eq!(outcome.subtitle, "");
            }
        }
    }

    /// Start times survive the 12-hour subtitle format.
    #[test]
    fn start_time_text_round_trip(hour in 0u32..24, minute in 0u32..60) {
        let start = NaiveTime::from_hms_opt(hour, minute, 0).unwrap();
        prop_assert_eq!(decision::parse_start(&decision::format_start(start)), Some(start));
    }

    #[test]
    fn activity_line_round_trip(
        now in arb_instant(),
        millis in 0i64..1000,
        offset_hours in -12i32..=12,
        is_open in any::<bool>(),
        switch_position in arb_switch(),
        motion in any::<bool>(),
    ) {
        let offset = chrono::FixedOffset::east_opt(offset_hours * 3600).unwrap();
        let timestamp = (now + TimeDelta::milliseconds(millis))
            .and_local_timezone(offset)
            .unwrap();
        let record = ActivityRecord { timestamp, is_open, switch_position, motion };
        let parsed: ActivityRecord = record.to_line().parse().unwrap();
        prop_assert_eq!(parsed, record);
    }
}
