//! Validation report models.
//!
//! Unlike aggregate quality scores, these findings carry the offending
//! literal values and source lines: they exist so an operator can look at
//! the exact rows the normalizer will repair or reject.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::ValidityWindow;
use crate::models::RecordKind;

/// Null counts for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnNulls {
    /// Column name
    pub column: String,
    /// Null cells in this column
    pub null_count: u64,
    /// Source lines holding a null in this column
    pub source_lines: Vec<u64>,
}

/// Result of the null check for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletenessFindings {
    /// Columns with at least one null
    pub columns: Vec<ColumnNulls>,
    /// Total null cells across all required columns
    pub total_nulls: u64,
    /// Source lines with at least one null
    pub rows_with_nulls: Vec<u64>,
}

impl CompletenessFindings {
    /// Number of rows with at least one null.
    pub fn row_count(&self) -> u64 {
        self.rows_with_nulls.len() as u64
    }
}

/// Rows sharing one key value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Key values as entered, whitespace made visible
    pub key: Vec<String>,
    /// First row carrying the key
    pub first_source_line: u64,
    /// Later rows repeating the key
    pub duplicate_source_lines: Vec<u64>,
}

/// Result of the duplicate check for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniquenessFindings {
    /// Columns forming the compared key
    pub key_columns: Vec<String>,
    /// Keys that occur more than once, in source order
    pub duplicate_groups: Vec<DuplicateGroup>,
    /// Rows repeating an earlier key
    pub duplicate_row_count: u64,
}

/// How many user ids have a given character length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthBucket {
    /// Length in characters
    pub length: usize,
    /// User ids of that length
    pub count: u64,
}

/// A user id whose length differs from the modal length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthAnomaly {
    /// Row holding the id
    pub source_line: u64,
    /// Length in characters, whitespace included
    pub length: usize,
    /// The literal value with whitespace made visible
    pub visible_value: String,
}

/// Result of the length/format check on user ids for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthFindings {
    /// Length distribution, ascending by length
    pub distribution: Vec<LengthBucket>,
    /// Most common length, if any user id is present
    pub modal_length: Option<usize>,
    /// Length every canonical user id must have
    pub expected_length: usize,
    /// Ids whose length differs from the modal length
    pub anomalies: Vec<LengthAnomaly>,
}

/// Canonical type a staged value is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    /// 64-bit signed integer
    Integer,
    /// Calendar date in one of the accepted layouts
    Date,
    /// Exactly one character
    SingleCharacter,
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::Date => write!(f, "date"),
            Self::SingleCharacter => write!(f, "char(1)"),
        }
    }
}

/// A value that does not cast to its target type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoercionFailure {
    /// Row holding the value
    pub source_line: u64,
    /// Column holding the value
    pub column: String,
    /// Type the value failed to cast to
    pub target: TargetType,
    /// The literal value as staged
    pub value: String,
    /// Why the cast failed
    pub message: String,
}

/// A points value containing characters no number would.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterFinding {
    /// Row holding the value
    pub source_line: u64,
    /// The literal points value
    pub value: String,
}

/// Result of the type-coercion check for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyFindings {
    /// Failed casts in source order
    pub failures: Vec<CoercionFailure>,
    /// Points values outside `[A-Za-z0-9 .-]`
    pub unexpected_characters: Vec<CharacterFinding>,
}

/// All per-table findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    /// Table the findings describe
    pub table: RecordKind,
    /// Staged rows examined
    pub row_count: u64,
    /// Null check
    pub completeness: CompletenessFindings,
    /// Duplicate check
    pub uniqueness: UniquenessFindings,
    /// User id length check
    pub lengths: LengthFindings,
    /// Type-coercion check
    pub consistency: ConsistencyFindings,
}

impl TableReport {
    /// Creates an empty report for a table.
    pub fn new(table: RecordKind, row_count: u64) -> Self {
        Self {
            table,
            row_count,
            completeness: CompletenessFindings::default(),
            uniqueness: UniquenessFindings::default(),
            lengths: LengthFindings::default(),
            consistency: ConsistencyFindings::default(),
        }
    }

    /// Source lines with at least one finding from any check.
    pub fn flagged_rows(&self) -> BTreeSet<u64> {
        let mut rows: BTreeSet<u64> = self.completeness.rows_with_nulls.iter().copied().collect();
        rows.extend(
            self.uniqueness
                .duplicate_groups
                .iter()
                .flat_map(|group| group.duplicate_source_lines.iter().copied()),
        );
        rows.extend(self.lengths.anomalies.iter().map(|a| a.source_line));
        rows.extend(self.consistency.failures.iter().map(|f| f.source_line));
        rows.extend(
            self.consistency
                .unexpected_characters
                .iter()
                .map(|f| f.source_line),
        );
        rows
    }
}

/// A parsed event date and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateExtreme {
    /// Parsed date
    pub date: NaiveDate,
    /// Row holding the date
    pub source_line: u64,
    /// The literal as entered
    pub value: String,
}

/// Date range over parsed event dates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangeProfile {
    /// Dates that parsed
    pub parsed_count: u64,
    /// Earliest dates, ascending
    pub earliest: Vec<DateExtreme>,
    /// Latest dates, descending
    pub latest: Vec<DateExtreme>,
    /// Source lines whose date precedes the founding date
    pub before_window: Vec<u64>,
    /// Source lines whose date follows the cutoff date
    pub after_window: Vec<u64>,
}

/// One distinct value and its frequency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCount {
    /// The value as staged
    pub value: String,
    /// Rows holding it
    pub count: u64,
}

/// Distinct values of a low-cardinality column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinctValues {
    /// Table holding the column
    pub table: RecordKind,
    /// Column name
    pub column: String,
    /// Values in ascending order, nulls excluded
    pub values: Vec<ValueCount>,
    /// True when more distinct values exist than were listed
    pub truncated: bool,
}

/// Event rows whose user id does not appear in the user table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceProfile {
    /// Event rows with an unknown user id
    pub orphan_event_rows: u64,
    /// Distinct unknown user ids
    pub orphan_user_ids: u64,
}

/// Operator-facing diagnostics that never gate the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFindings {
    /// Event date range against the window
    pub event_dates: DateRangeProfile,
    /// Value lists for low-cardinality columns
    pub distinct_values: Vec<DistinctValues>,
    /// Event-to-user linkage
    pub references: ReferenceProfile,
}

/// Complete validator output for one staging snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Window the dates were judged against
    pub window: ValidityWindow,
    /// User table findings
    pub users: TableReport,
    /// Event table findings
    pub events: TableReport,
    /// Informational profiles
    pub profile: ProfileFindings,
}

impl ValidationReport {
    /// Findings for one table.
    pub fn table(&self, kind: RecordKind) -> &TableReport {
        match kind {
            RecordKind::Users => &self.users,
            RecordKind::Events => &self.events,
        }
    }

    /// Source lines of a table with at least one finding.
    ///
    /// Event rows outside the validity window count as flagged; the other
    /// profile findings are informational and do not.
    pub fn flagged_rows(&self, kind: RecordKind) -> BTreeSet<u64> {
        let mut rows = self.table(kind).flagged_rows();
        if kind == RecordKind::Events {
            rows.extend(self.profile.event_dates.before_window.iter().copied());
            rows.extend(self.profile.event_dates.after_window.iter().copied());
        }
        rows
    }

    /// Rows across both tables with at least one null required field.
    pub fn null_count(&self) -> u64 {
        self.users.completeness.row_count() + self.events.completeness.row_count()
    }

    /// Returns true when any check produced a finding.
    pub fn has_findings(&self) -> bool {
        !self.flagged_rows(RecordKind::Users).is_empty()
            || !self.flagged_rows(RecordKind::Events).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ValidationReport {
        ValidationReport {
            window: ValidityWindow::default(),
            users: TableReport::new(RecordKind::Users, 3),
            events: TableReport::new(RecordKind::Events, 5),
            profile: ProfileFindings::default(),
        }
    }

    #[test]
    fn test_empty_report_has_no_findings() {
        let report = report();
        assert!(!report.has_findings());
        assert_eq!(report.null_count(), 0);
    }

    #[test]
    fn test_flagged_rows_union() {
        let mut report = report();
        report.events.completeness.rows_with_nulls = vec![2];
        report.events.lengths.anomalies.push(LengthAnomaly {
            source_line: 4,
            length: 37,
            visible_value: "x\\s".to_string(),
        });
        report.events.consistency.failures.push(CoercionFailure {
            source_line: 4,
            column: "points".to_string(),
            target: TargetType::Integer,
            value: "45?".to_string(),
            message: "not an integer".to_string(),
        });
        report.profile.event_dates.after_window.push(5);

        let flagged: Vec<u64> = report.flagged_rows(RecordKind::Events).into_iter().collect();
        assert_eq!(flagged, vec![2, 4, 5]);
        assert!(report.flagged_rows(RecordKind::Users).is_empty());
        assert_eq!(report.null_count(), 1);
    }
}
