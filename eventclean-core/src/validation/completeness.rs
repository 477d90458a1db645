//! Null check over staged rows.

use crate::models::StagingRow;

use super::models::{ColumnNulls, CompletenessFindings};

/// Reports every null required field, by column and by row.
pub fn analyze_completeness<R: StagingRow>(rows: &[R]) -> CompletenessFindings {
    let mut columns: Vec<ColumnNulls> = R::FIELDS
        .iter()
        .map(|field| ColumnNulls {
            column: field.column_name().to_string(),
            null_count: 0,
            source_lines: Vec::new(),
        })
        .collect();
    let mut rows_with_nulls = Vec::new();
    let mut total_nulls: u64 = 0;

    for row in rows {
        let mut row_has_null = false;
        for (index, field) in R::FIELDS.iter().enumerate() {
            if row.value(*field).is_none() {
                columns[index].null_count += 1;
                columns[index].source_lines.push(row.source_line());
                total_nulls += 1;
                row_has_null = true;
            }
        }
        if row_has_null {
            rows_with_nulls.push(row.source_line());
        }
    }

    columns.retain(|column| column.null_count > 0);

    CompletenessFindings {
        columns,
        total_nulls,
        rows_with_nulls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StagingEventRecord, StagingUserRecord};

    fn event(line: u64, hour: Option<&str>, points: Option<&str>) -> StagingEventRecord {
        StagingEventRecord {
            source_line: line,
            userid: Some("u".to_string()),
            event_date: Some("1/2/19".to_string()),
            hour: hour.map(str::to_string),
            points: points.map(str::to_string),
        }
    }

    #[test]
    fn test_completeness_all_present() {
        let rows = vec![event(1, Some("1"), Some("2")), event(2, Some("3"), Some("4"))];
        let findings = analyze_completeness(&rows);

        assert_eq!(findings.total_nulls, 0);
        assert!(findings.columns.is_empty());
        assert_eq!(findings.row_count(), 0);
    }

    #[test]
    fn test_completeness_with_nulls() {
        let rows = vec![
            event(1, None, None),
            event(2, Some("3"), Some("4")),
            event(3, None, Some("4")),
        ];
        let findings = analyze_completeness(&rows);

        assert_eq!(findings.total_nulls, 3);
        assert_eq!(findings.rows_with_nulls, vec![1, 3]);

        let hour = findings.columns.iter().find(|c| c.column == "hour").unwrap();
        assert_eq!(hour.null_count, 2);
        assert_eq!(hour.source_lines, vec![1, 3]);

        let points = findings.columns.iter().find(|c| c.column == "points").unwrap();
        assert_eq!(points.source_lines, vec![1]);
    }

    #[test]
    fn test_completeness_empty_table() {
        let rows: Vec<StagingUserRecord> = Vec::new();
        let findings = analyze_completeness(&rows);
        assert_eq!(findings, CompletenessFindings::default());
    }
}
