//! Type-coercion check.
//!
//! Every non-null value is cast to its canonical type with the same
//! functions the normalizer uses. A failed cast is recorded and the check
//! moves on; one bad value never hides the rest of the table.

use crate::models::{Field, StagingEventRecord, StagingRow, StagingUserRecord};
use crate::normalize::coerce::{
    CoercionError, coerce_integer, coerce_single_character, has_unexpected_points_characters,
    parse_event_date,
};

use super::models::{CharacterFinding, CoercionFailure, ConsistencyFindings, TargetType};

/// Target type for each checked column. User ids are checked by length
/// instead and are not listed.
pub fn target_type(field: Field) -> Option<TargetType> {
    match field {
        Field::UserId => None,
        Field::Subscriber | Field::Hour | Field::Points => Some(TargetType::Integer),
        Field::Category => Some(TargetType::SingleCharacter),
        Field::EventDate => Some(TargetType::Date),
    }
}

fn try_coerce(target: TargetType, value: &str) -> Result<(), CoercionError> {
    match target {
        TargetType::Integer => coerce_integer(value).map(|_| ()),
        TargetType::Date => parse_event_date(value).map(|_| ()),
        TargetType::SingleCharacter => coerce_single_character(value).map(|_| ()),
    }
}

fn check_rows<R: StagingRow>(rows: &[R]) -> Vec<CoercionFailure> {
    let mut failures = Vec::new();
    for row in rows {
        for field in R::FIELDS {
            let (Some(target), Some(value)) = (target_type(*field), row.value(*field)) else {
                continue;
            };
            if let Err(error) = try_coerce(target, value) {
                failures.push(CoercionFailure {
                    source_line: row.source_line(),
                    column: field.column_name().to_string(),
                    target,
                    value: value.to_string(),
                    message: error.to_string(),
                });
            }
        }
    }
    failures
}

/// Checks the user table.
pub fn analyze_user_consistency(rows: &[StagingUserRecord]) -> ConsistencyFindings {
    ConsistencyFindings {
        failures: check_rows(rows),
        unexpected_characters: Vec::new(),
    }
}

/// Checks the event table, including the points character-class check.
pub fn analyze_event_consistency(rows: &[StagingEventRecord]) -> ConsistencyFindings {
    let unexpected_characters = rows
        .iter()
        .filter_map(|row| {
            let points = row.points.as_deref()?;
            has_unexpected_points_characters(points).then(|| CharacterFinding {
                source_line: row.source_line,
                value: points.to_string(),
            })
        })
        .collect();

    ConsistencyFindings {
        failures: check_rows(rows),
        unexpected_characters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(line: u64, date: &str, hour: &str, points: &str) -> StagingEventRecord {
        StagingEventRecord {
            source_line: line,
            userid: Some("u".to_string()),
            event_date: Some(date.to_string()),
            hour: Some(hour.to_string()),
            points: Some(points.to_string()),
        }
    }

    #[test]
    fn test_clean_rows_have_no_failures() {
        let rows = vec![event(1, "1/24/19", "17", "5"), event(2, "2019-01-25", "0", "-3")];
        let findings = analyze_event_consistency(&rows);
        assert!(findings.failures.is_empty());
        assert!(findings.unexpected_characters.is_empty());
    }

    #[test]
    fn test_check_continues_past_bad_rows() {
        let rows = vec![
            event(1, "19/24/2019", "17", "\"732"),
            event(2, "1/24/19", "x", "5"),
            event(3, "1/24/19", "17", "45?"),
        ];
        let findings = analyze_event_consistency(&rows);

        let summary: Vec<(u64, &str)> = findings
            .failures
            .iter()
            .map(|f| (f.source_line, f.column.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![(1, "event_date"), (1, "points"), (2, "hour"), (3, "points")]
        );
        assert_eq!(findings.failures[0].target, TargetType::Date);
        assert_eq!(findings.failures[0].value, "19/24/2019");

        let lines: Vec<u64> = findings
            .unexpected_characters
            .iter()
            .map(|f| f.source_line)
            .collect();
        assert_eq!(lines, vec![1, 3]);
    }

    #[test]
    fn test_user_consistency() {
        let rows = vec![
            StagingUserRecord {
                source_line: 1,
                userid: Some("u".to_string()),
                subscriber: Some("1".to_string()),
                category: Some("AB".to_string()),
            },
            StagingUserRecord {
                source_line: 2,
                userid: Some("v".to_string()),
                subscriber: Some("true".to_string()),
                category: None,
            },
        ];
        let findings = analyze_user_consistency(&rows);
        assert_eq!(findings.failures.len(), 2);
        assert_eq!(findings.failures[0].target, TargetType::SingleCharacter);
        assert_eq!(findings.failures[1].column, "subscriber");
    }
}
