//! Property tests for the canonical invariants.
//!
//! Whatever the staging text, a row the normalizer accepts must satisfy every
//! canonical constraint, and repairs must recover the intended value.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use eventclean_core::{
    canonical::CanonicalBatch,
    config::ValidityWindow,
    models::{StagingEventRecord, StagingSnapshot, StagingUserRecord, UserId},
    normalize::{Disposition, Normalizer, coerce},
};
use proptest::prelude::*;

const ID: &str = "0a1b2c3d-4e5f-6a7b-8c9d-0e1f2a3b4c5d";

/// Free text biased toward the characters that show up in the raw files.
fn raw_text() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        1 => Just(None),
        3 => "[0-9A-Ca-f\"? /\\-]{0,40}".prop_map(Some),
        2 => (-30i32..60).prop_map(|n| Some(n.to_string())),
        2 => Just(Some(ID.to_string())),
        2 => Just(Some(format!("{} ", ID))),
    ]
}

fn raw_date() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        1 => raw_text(),
        3 => (1u32..=19, 1u32..=31, 0u32..100)
            .prop_map(|(m, d, y)| Some(format!("{}/{}/{:02}", m, d, y))),
        1 => (1u32..=12, 1u32..=28, 1990i32..2045)
            .prop_map(|(m, d, y)| Some(format!("{}/{}/{}", m, d, y))),
    ]
}

fn user_row() -> impl Strategy<Value = StagingUserRecord> {
    (raw_text(), raw_text(), raw_text()).prop_map(|(userid, subscriber, category)| {
        StagingUserRecord {
            source_line: 0,
            userid,
            subscriber,
            category,
        }
    })
}

fn event_row() -> impl Strategy<Value = StagingEventRecord> {
    (raw_text(), raw_date(), raw_text(), raw_text()).prop_map(|(userid, event_date, hour, points)| {
        StagingEventRecord {
            source_line: 0,
            userid,
            event_date,
            hour,
            points,
        }
    })
}

fn numbered<T>(mut rows: Vec<T>, set_line: impl Fn(&mut T, u64)) -> Vec<T> {
    for (index, row) in rows.iter_mut().enumerate() {
        set_line(row, index as u64 + 1);
    }
    rows
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_accepted_rows_satisfy_canonical_constraints(
        users in prop::collection::vec(user_row(), 0..20),
        events in prop::collection::vec(event_row(), 0..40),
    ) {
        let snapshot = StagingSnapshot {
            users: numbered(users, |row, line| row.source_line = line),
            events: numbered(events, |row, line| row.source_line = line),
        };
        let window = ValidityWindow::default();
        let outcome = Normalizer::default().normalize(&snapshot);

        prop_assert_eq!(outcome.users.len(), snapshot.users.len());
        prop_assert_eq!(outcome.events.len(), snapshot.events.len());

        let mut ids = HashSet::new();
        for user in outcome.accepted_users() {
            prop_assert_eq!(user.userid.as_str().chars().count(), 36);
            prop_assert!(matches!(user.subscriber_flag(), 0 | 1));
            prop_assert!(["A", "B", "C"].contains(&user.category.as_str()));
            prop_assert!(ids.insert(user.userid.clone()), "duplicate user id accepted");
        }
        for event in outcome.accepted_events() {
            prop_assert!((0..=23).contains(&event.hour.value()));
            prop_assert!(window.contains(event.event_date));
        }

        // The batch re-check never disagrees with the default rules
        prop_assert!(CanonicalBatch::from_outcome(&outcome, &window).is_ok());
    }

    #[test]
    fn prop_normalization_is_deterministic(
        events in prop::collection::vec(event_row(), 0..30),
    ) {
        let snapshot = StagingSnapshot {
            users: Vec::new(),
            events: numbered(events, |row, line| row.source_line = line),
        };
        let normalizer = Normalizer::default();
        prop_assert_eq!(normalizer.normalize(&snapshot), normalizer.normalize(&snapshot));
    }

    #[test]
    fn prop_userid_repair_recovers_identifier(
        noise in prop::collection::vec(prop_oneof![Just('"'), Just(' '), Just('\t')], 1..4),
        position in 0usize..=36,
    ) {
        let mut raw: String = ID.to_string();
        let insert_at = raw.char_indices().nth(position).map_or(raw.len(), |(i, _)| i);
        let noise: String = noise.into_iter().collect();
        raw.insert_str(insert_at, &noise);

        let repaired = coerce::strip_userid_noise(&raw);
        prop_assert_eq!(&*repaired, ID);
        prop_assert!(UserId::parse(&repaired).is_some());
    }

    #[test]
    fn prop_points_repair_recovers_integer(
        points in any::<i64>(),
        leading_quote in any::<bool>(),
        trailing_marks in 0usize..3,
    ) {
        let mut raw = String::new();
        if leading_quote {
            raw.push('"');
        }
        raw.push_str(&points.to_string());
        raw.push_str(&"?".repeat(trailing_marks));

        let repaired = coerce::strip_points_noise(&raw);
        prop_assert_eq!(coerce::coerce_integer(&repaired).ok(), Some(points));
    }

    #[test]
    fn prop_iso_and_slash_dates_agree(days in 0i64..3_800) {
        let date = NaiveDate::from_ymd_opt(2013, 1, 1).unwrap() + chrono::Duration::days(days);
        let iso = date.format("%Y-%m-%d").to_string();
        let slash = format!("{}/{}/{}", date.month(), date.day(), date.year());

        prop_assert_eq!(coerce::parse_event_date(&iso).ok(), Some(date));
        prop_assert_eq!(coerce::parse_event_date(&slash).ok(), Some(date));
    }

    #[test]
    fn prop_accepted_events_round_trip_as_is(
        days in prop::collection::vec(0i64..3_800, 1..20),
        hour in 0i32..24,
        points in -1000i64..1000,
    ) {
        let founding = NaiveDate::from_ymd_opt(2013, 1, 1).unwrap();
        let rows: Vec<StagingEventRecord> = days
            .iter()
            .enumerate()
            .map(|(index, offset)| StagingEventRecord {
                source_line: index as u64 + 1,
                userid: Some(ID.to_string()),
                event_date: Some(
                    (founding + chrono::Duration::days(*offset)).format("%Y-%m-%d").to_string(),
                ),
                hour: Some(hour.to_string()),
                points: Some(points.to_string()),
            })
            .collect();

        let known = HashSet::new();
        for decision in Normalizer::default().normalize_events(&rows, &known) {
            prop_assert!(
                !matches!(decision.disposition, Disposition::AcceptRepaired { .. }),
                "unexpected AcceptRepaired disposition"
            );
        }
    }
}
