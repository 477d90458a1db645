//! Duplicate detection on keys as entered.
//!
//! Users are keyed on `userid`, events on the full
//! `(userid, event_date, hour, points)` tuple. Values are compared exactly
//! as staged, before any repair, so this reports what the raw data holds.
//! The normalizer repeats the check on canonical values.

use std::collections::HashMap;

use crate::models::{Field, StagingRow};
use crate::normalize::coerce::make_whitespace_visible;

use super::models::{DuplicateGroup, UniquenessFindings};

const NULL_MARKER: &str = "<null>";

/// Reports rows whose key repeats an earlier row's key.
///
/// Groups are listed in order of their first occurrence.
pub fn analyze_uniqueness<R: StagingRow>(rows: &[R], key: &[Field]) -> UniquenessFindings {
    let mut groups: Vec<DuplicateGroup> = Vec::new();
    let mut group_index: HashMap<Vec<Option<&str>>, usize> = HashMap::new();
    let mut first_seen: HashMap<Vec<Option<&str>>, u64> = HashMap::new();
    let mut duplicate_row_count: u64 = 0;

    for row in rows {
        let values: Vec<Option<&str>> = key.iter().map(|field| row.value(*field)).collect();

        let Some(first_line) = first_seen.get(&values).copied() else {
            first_seen.insert(values, row.source_line());
            continue;
        };

        duplicate_row_count += 1;
        match group_index.get(&values) {
            Some(index) => groups[*index].duplicate_source_lines.push(row.source_line()),
            None => {
                group_index.insert(values.clone(), groups.len());
                groups.push(DuplicateGroup {
                    key: values
                        .iter()
                        .map(|value| value.map_or_else(|| NULL_MARKER.to_string(), make_whitespace_visible))
                        .collect(),
                    first_source_line: first_line,
                    duplicate_source_lines: vec![row.source_line()],
                });
            }
        }
    }

    UniquenessFindings {
        key_columns: key.iter().map(|f| f.column_name().to_string()).collect(),
        duplicate_groups: groups,
        duplicate_row_count,
    }
}
