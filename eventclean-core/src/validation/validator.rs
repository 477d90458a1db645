//! Validator facade.

use tracing::{info, warn};

use crate::config::ValidityWindow;
use crate::models::{Field, RecordKind, StagingSnapshot};

use super::anomaly::analyze_userid_lengths;
use super::completeness::analyze_completeness;
use super::config::ValidatorConfig;
use super::consistency::{analyze_event_consistency, analyze_user_consistency};
use super::models::{TableReport, ValidationReport};
use super::profile::analyze_profile;
use super::uniqueness::analyze_uniqueness;

/// Runs the fixed battery of checks against a staging snapshot.
///
/// Checks are independent and read-only. Validation never fails on data:
/// every finding lands in the returned report.
///
/// # Example
///
/// ```rust
/// use eventclean_core::config::ValidityWindow;
/// use eventclean_core::models::StagingSnapshot;
/// use eventclean_core::validation::{Validator, ValidatorConfig};
///
/// let validator = Validator::new(ValidatorConfig::default(), ValidityWindow::default());
/// let report = validator.validate(&StagingSnapshot::default());
/// assert_eq!(report.null_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct Validator {
    config: ValidatorConfig,
    window: ValidityWindow,
}

impl Validator {
    /// Creates a new validator.
    pub fn new(config: ValidatorConfig, window: ValidityWindow) -> Self {
        Self { config, window }
    }

    /// Creates a validator with default diagnostics settings.
    pub fn with_defaults(window: ValidityWindow) -> Self {
        Self::new(ValidatorConfig::default(), window)
    }

    /// Returns a reference to the validator configuration.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validates both staging tables.
    pub fn validate(&self, snapshot: &StagingSnapshot) -> ValidationReport {
        let expected_length = self.config.expected_userid_length;

        let mut users = TableReport::new(RecordKind::Users, snapshot.users.len() as u64);
        users.completeness = analyze_completeness(&snapshot.users);
        users.uniqueness = analyze_uniqueness(&snapshot.users, &[Field::UserId]);
        users.lengths = analyze_userid_lengths(&snapshot.users, expected_length);
        users.consistency = analyze_user_consistency(&snapshot.users);

        let mut events = TableReport::new(RecordKind::Events, snapshot.events.len() as u64);
        events.completeness = analyze_completeness(&snapshot.events);
        events.uniqueness = analyze_uniqueness(&snapshot.events, &Field::EVENT_FIELDS);
        events.lengths = analyze_userid_lengths(&snapshot.events, expected_length);
        events.consistency = analyze_event_consistency(&snapshot.events);

        let profile = analyze_profile(snapshot, &self.window, &self.config);

        let report = ValidationReport {
            window: self.window,
            users,
            events,
            profile,
        };
        log_report(&report);
        report
    }
}

fn log_report(report: &ValidationReport) {
    for table in [&report.users, &report.events] {
        let name = table.table.staging_table();
        if table.completeness.total_nulls > 0 {
            warn!(
                "{}: {} null value(s) in {} row(s)",
                name,
                table.completeness.total_nulls,
                table.completeness.row_count()
            );
        }
        if table.uniqueness.duplicate_row_count > 0 {
            warn!(
                "{}: {} row(s) repeat an earlier ({}) key",
                name,
                table.uniqueness.duplicate_row_count,
                table.uniqueness.key_columns.join(", ")
            );
        }
        for anomaly in &table.lengths.anomalies {
            info!(
                "{} line {}: userid length {} '{}'",
                name, anomaly.source_line, anomaly.length, anomaly.visible_value
            );
        }
        for failure in &table.consistency.failures {
            info!(
                "{} line {}: {} does not cast to {}: {}",
                name, failure.source_line, failure.column, failure.target, failure.message
            );
        }
        info!(
            "{}: {} row(s), {} flagged",
            name,
            table.row_count,
            report.flagged_rows(table.table).len()
        );
    }

    let dates = &report.profile.event_dates;
    if let (Some(earliest), Some(latest)) = (dates.earliest.first(), dates.latest.first()) {
        info!(
            "Event dates range from {} to {} ({} before founding, {} after cutoff)",
            earliest.date,
            latest.date,
            dates.before_window.len(),
            dates.after_window.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StagingEventRecord, StagingUserRecord};

    const ID: &str = "0a1b2c3d-4e5f-6a7b-8c9d-0e1f2a3b4c5d";

    fn user(line: u64, userid: &str) -> StagingUserRecord {
        StagingUserRecord {
            source_line: line,
            userid: Some(userid.to_string()),
            subscriber: Some("1".to_string()),
            category: Some("A".to_string()),
        }
    }

    fn event(line: u64, userid: &str, date: &str, points: &str) -> StagingEventRecord {
        StagingEventRecord {
            source_line: line,
            userid: Some(userid.to_string()),
            event_date: Some(date.to_string()),
            hour: Some("17".to_string()),
            points: Some(points.to_string()),
        }
    }

    fn snapshot() -> StagingSnapshot {
        StagingSnapshot {
            users: vec![user(1, ID)],
            events: vec![
                event(1, ID, "1/24/19", "5"),
                event(2, ID, "19/24/2019", "5"),
                event(3, &format!("{} ", ID), "1/25/19", "6"),
                event(4, ID, "1/26/19", "\"732"),
                event(5, ID, "6/1/99", "7"),
                event(6, ID, "1/27/19", "8"),
            ],
        }
    }

    #[test]
    fn test_validate_reports_every_anomaly() {
        let report = Validator::with_defaults(ValidityWindow::default()).validate(&snapshot());

        assert_eq!(report.events.row_count, 6);
        assert_eq!(report.events.lengths.modal_length, Some(36));
        assert_eq!(report.events.lengths.anomalies.len(), 1);
        assert_eq!(report.events.lengths.anomalies[0].source_line, 3);
        assert_eq!(report.profile.event_dates.before_window, vec![5]);

        let flagged: Vec<u64> = report.flagged_rows(RecordKind::Events).into_iter().collect();
        assert_eq!(flagged, vec![2, 3, 4, 5]);
        assert!(report.flagged_rows(RecordKind::Users).is_empty());
        assert_eq!(report.null_count(), 0);
    }

    #[test]
    fn test_validate_counts_null_rows() {
        let mut snapshot = snapshot();
        snapshot.users[0].category = None;
        snapshot.events[0].hour = None;
        snapshot.events[0].points = None;

        let report = Validator::with_defaults(ValidityWindow::default()).validate(&snapshot);
        assert_eq!(report.null_count(), 2);
        assert_eq!(report.events.completeness.total_nulls, 2);
    }

    #[test]
    fn test_validate_does_not_modify_snapshot() {
        let snapshot = snapshot();
        let before = snapshot.clone();
        let _ = Validator::with_defaults(ValidityWindow::default()).validate(&snapshot);
        assert_eq!(snapshot, before);
    }

    #[test]
    fn test_report_serializes() {
        let report = Validator::with_defaults(ValidityWindow::default()).validate(&snapshot());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["events"]["table"], "events");
        assert!(json["profile"]["event_dates"]["earliest"].is_array());
    }
}
