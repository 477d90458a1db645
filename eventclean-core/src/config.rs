//! Pipeline configuration.
//!
//! Everything a run needs is passed in explicitly through [`PipelineConfig`];
//! nothing is read from process-wide state inside the core crate.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EventCleanError;
use crate::normalize::RuleSet;
use crate::validation::ValidatorConfig;

/// Inclusive range of acceptable event dates.
///
/// The lower bound is the organization's founding date and the upper bound
/// is the analysis cutoff. Both are dataset constants supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    /// First acceptable event date
    pub founding_date: NaiveDate,
    /// Last acceptable event date
    pub cutoff_date: NaiveDate,
}

impl Default for ValidityWindow {
    fn default() -> Self {
        Self {
            founding_date: NaiveDate::from_ymd_opt(2013, 1, 1).unwrap_or(NaiveDate::MIN),
            cutoff_date: NaiveDate::from_ymd_opt(2023, 7, 13).unwrap_or(NaiveDate::MAX),
        }
    }
}

/// Where a date sits relative to the validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPosition {
    /// Earlier than the founding date
    BeforeFounding,
    /// Inside the window, bounds included
    Within,
    /// Later than the cutoff date
    AfterCutoff,
}

impl ValidityWindow {
    /// Creates a window, rejecting an inverted range.
    pub fn new(founding_date: NaiveDate, cutoff_date: NaiveDate) -> crate::Result<Self> {
        let window = Self {
            founding_date,
            cutoff_date,
        };
        window.validate()?;
        Ok(window)
    }

    /// Validates that the founding date does not follow the cutoff.
    pub fn validate(&self) -> crate::Result<()> {
        if self.founding_date > self.cutoff_date {
            return Err(EventCleanError::configuration(format!(
                "founding date {} is after cutoff date {}",
                self.founding_date, self.cutoff_date
            )));
        }
        Ok(())
    }

    /// Classifies a date against the window (bounds inclusive).
    pub fn position(&self, date: NaiveDate) -> WindowPosition {
        if date < self.founding_date {
            WindowPosition::BeforeFounding
        } else if date > self.cutoff_date {
            WindowPosition::AfterCutoff
        } else {
            WindowPosition::Within
        }
    }

    /// Returns true when the date lies inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.position(date) == WindowPosition::Within
    }
}

/// What to do when the validator finds null required fields.
///
/// Nulls stop the run unless the operator explicitly opts into per-row
/// rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullPolicy {
    /// Fail the run at the validation stage
    #[default]
    Abort,
    /// Reject the affected rows and report the count
    RejectRow,
}

/// Configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Base directory for relative input and output paths
    pub working_directory: PathBuf,
    /// Raw user records (CSV with header)
    pub users_file: PathBuf,
    /// Raw event-participation records (CSV with header)
    pub events_file: PathBuf,
    /// Directory receiving the canonical backup export
    pub output_directory: PathBuf,
    /// File name of the canonical event backup
    pub backup_file_name: String,
    /// Event date validity window
    pub window: ValidityWindow,
    /// Handling of null required fields
    pub null_policy: NullPolicy,
    /// Export canonical events after commit
    pub export_backup: bool,
    /// Keep staging tables after commit for inspection
    pub keep_staging: bool,
    /// Diagnostics settings for the validator
    pub validator: ValidatorConfig,
    /// Anomaly-to-action table applied by the normalizer
    pub rules: RuleSet,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            working_directory: PathBuf::from("."),
            users_file: PathBuf::from("data/users.csv"),
            events_file: PathBuf::from("data/event_performance.csv"),
            output_directory: PathBuf::from("data/clean"),
            backup_file_name: "event_performance_clean.csv".to_string(),
            window: ValidityWindow::default(),
            null_policy: NullPolicy::default(),
            export_backup: true,
            keep_staging: false,
            validator: ValidatorConfig::default(),
            rules: RuleSet::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a config rooted at the given working directory.
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            ..Default::default()
        }
    }

    /// Builder method to set the validity window.
    pub fn with_window(mut self, window: ValidityWindow) -> Self {
        self.window = window;
        self
    }

    /// Builder method to set the null policy.
    pub fn with_null_policy(mut self, null_policy: NullPolicy) -> Self {
        self.null_policy = null_policy;
        self
    }

    /// Builder method to enable or disable the backup export.
    pub fn with_export_backup(mut self, export_backup: bool) -> Self {
        self.export_backup = export_backup;
        self
    }

    /// Builder method to keep staging tables after commit.
    pub fn with_keep_staging(mut self, keep_staging: bool) -> Self {
        self.keep_staging = keep_staging;
        self
    }

    /// Builder method to set the normalizer rule table.
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Validates paths and the window.
    pub fn validate(&self) -> crate::Result<()> {
        self.window.validate()?;
        self.validator.validate()?;

        if self.backup_file_name.trim().is_empty() {
            return Err(EventCleanError::configuration(
                "backup file name cannot be empty",
            ));
        }
        if Path::new(&self.backup_file_name).components().count() != 1 {
            return Err(EventCleanError::configuration(
                "backup file name must not contain directories",
            ));
        }
        Ok(())
    }

    /// Absolute or working-directory-relative path of the user file.
    pub fn users_path(&self) -> PathBuf {
        self.resolve(&self.users_file)
    }

    /// Absolute or working-directory-relative path of the event file.
    pub fn events_path(&self) -> PathBuf {
        self.resolve(&self.events_file)
    }

    /// Full path of the canonical event backup file.
    pub fn backup_path(&self) -> PathBuf {
        self.resolve(&self.output_directory)
            .join(&self.backup_file_name)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_directory.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_nulls_abort_by_default() {
        let config = PipelineConfig::new("/data/run");
        assert_eq!(config.null_policy, NullPolicy::Abort);
        assert_eq!(
            config.with_null_policy(NullPolicy::RejectRow).null_policy,
            NullPolicy::RejectRow
        );
    }

    #[test]
    fn test_default_window_matches_dataset_constants() {
        let window = ValidityWindow::default();
        assert_eq!(window.founding_date, date(2013, 1, 1));
        assert_eq!(window.cutoff_date, date(2023, 7, 13));
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let window = ValidityWindow::default();
        assert!(window.contains(date(2013, 1, 1)));
        assert!(window.contains(date(2023, 7, 13)));
        assert_eq!(window.position(date(2012, 12, 31)), WindowPosition::BeforeFounding);
        assert_eq!(window.position(date(2023, 7, 14)), WindowPosition::AfterCutoff);
        assert_eq!(window.position(date(1999, 6, 1)), WindowPosition::BeforeFounding);
        assert_eq!(window.position(date(2039, 6, 1)), WindowPosition::AfterCutoff);
    }

    #[test]
    fn test_inverted_window_rejected() {
        assert!(ValidityWindow::new(date(2024, 1, 1), date(2023, 1, 1)).is_err());
        assert!(ValidityWindow::new(date(2023, 1, 1), date(2023, 1, 1)).is_ok());
    }

    #[test]
    fn test_paths_resolve_against_working_directory() {
        let config = PipelineConfig::new("/srv/analysis");
        assert_eq!(config.users_path(), PathBuf::from("/srv/analysis/data/users.csv"));
        assert_eq!(
            config.events_path(),
            PathBuf::from("/srv/analysis/data/event_performance.csv")
        );
        assert_eq!(
            config.backup_path(),
            PathBuf::from("/srv/analysis/data/clean/event_performance_clean.csv")
        );
    }

    #[test]
    fn test_absolute_input_paths_are_kept() {
        let config = PipelineConfig {
            users_file: PathBuf::from("/elsewhere/users.csv"),
            ..PipelineConfig::new("/srv/analysis")
        };
        assert_eq!(config.users_path(), PathBuf::from("/elsewhere/users.csv"));
    }

    #[test]
    fn test_backup_file_name_validation() {
        let config = PipelineConfig {
            backup_file_name: "nested/out.csv".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            backup_file_name: " ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(PipelineConfig::default().validate().is_ok());
    }
}
