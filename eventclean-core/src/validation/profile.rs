//! Date ranges and value profiles.
//!
//! These findings exist for operator judgement: date extremes against the
//! organization's timeline, the distinct values of small enumerations, and
//! how many events point at users the user table does not know.

use std::collections::{BTreeMap, HashSet};

use crate::config::{ValidityWindow, WindowPosition};
use crate::models::{Field, RecordKind, StagingEventRecord, StagingRow, StagingSnapshot};
use crate::normalize::coerce::{parse_event_date, strip_userid_noise};

use super::config::ValidatorConfig;
use super::models::{
    DateExtreme, DateRangeProfile, DistinctValues, ProfileFindings, ReferenceProfile, ValueCount,
};

/// Profiles a staging snapshot.
pub fn analyze_profile(
    snapshot: &StagingSnapshot,
    window: &ValidityWindow,
    config: &ValidatorConfig,
) -> ProfileFindings {
    let distinct_values = vec![
        distinct_values(&snapshot.users, Field::Subscriber, config.distinct_limit),
        distinct_values(&snapshot.users, Field::Category, config.distinct_limit),
        distinct_values(&snapshot.events, Field::Hour, config.distinct_limit),
    ];

    ProfileFindings {
        event_dates: profile_event_dates(&snapshot.events, window, config.extremes_limit),
        distinct_values,
        references: profile_references(snapshot),
    }
}

/// Earliest and latest parsed dates plus out-of-window rows.
///
/// Ties on date are broken by source line so the listing is stable.
pub fn profile_event_dates(
    rows: &[StagingEventRecord],
    window: &ValidityWindow,
    limit: usize,
) -> DateRangeProfile {
    let mut parsed: Vec<DateExtreme> = rows
        .iter()
        .filter_map(|row| {
            let value = row.event_date.as_deref()?;
            let date = parse_event_date(value).ok()?;
            Some(DateExtreme {
                date,
                source_line: row.source_line,
                value: value.to_string(),
            })
        })
        .collect();
    parsed.sort_by_key(|extreme| (extreme.date, extreme.source_line));

    let mut before_window = Vec::new();
    let mut after_window = Vec::new();
    for extreme in &parsed {
        match window.position(extreme.date) {
            WindowPosition::BeforeFounding => before_window.push(extreme.source_line),
            WindowPosition::AfterCutoff => after_window.push(extreme.source_line),
            WindowPosition::Within => {}
        }
    }
    before_window.sort_unstable();
    after_window.sort_unstable();

    let earliest = parsed.iter().take(limit).cloned().collect();
    let latest = parsed.iter().rev().take(limit).cloned().collect();

    DateRangeProfile {
        parsed_count: parsed.len() as u64,
        earliest,
        latest,
        before_window,
        after_window,
    }
}

/// Distinct non-null values of one column, ascending.
pub fn distinct_values<R: StagingRow>(rows: &[R], field: Field, limit: usize) -> DistinctValues {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for row in rows {
        if let Some(value) = row.value(field) {
            *counts.entry(value).or_default() += 1;
        }
    }

    let truncated = counts.len() > limit;
    let values = counts
        .into_iter()
        .take(limit)
        .map(|(value, count)| ValueCount {
            value: value.to_string(),
            count,
        })
        .collect();

    DistinctValues {
        table: R::KIND,
        column: field.column_name().to_string(),
        values,
        truncated,
    }
}

/// Counts event rows whose user id is absent from the user table.
///
/// Both sides are compared after user id repair, the same way the
/// normalizer will see them.
pub fn profile_references(snapshot: &StagingSnapshot) -> ReferenceProfile {
    let known: HashSet<String> = snapshot
        .users
        .iter()
        .filter_map(|user| user.userid.as_deref())
        .map(|userid| strip_userid_noise(userid).into_owned())
        .collect();

    let mut orphan_ids: HashSet<String> = HashSet::new();
    let mut orphan_event_rows: u64 = 0;
    for event in &snapshot.events {
        let Some(userid) = event.userid.as_deref() else {
            continue;
        };
        let userid = strip_userid_noise(userid);
        if !known.contains(userid.as_ref()) {
            orphan_event_rows += 1;
            orphan_ids.insert(userid.into_owned());
        }
    }

    if orphan_event_rows > 0 {
        tracing::info!(
            "{} {} row(s) reference {} user id(s) absent from {}",
            orphan_event_rows,
            RecordKind::Events.canonical_table(),
            orphan_ids.len(),
            RecordKind::Users.canonical_table()
        );
    }

    ReferenceProfile {
        orphan_event_rows,
        orphan_user_ids: orphan_ids.len() as u64,
    }
}
