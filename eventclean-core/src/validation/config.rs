//! Validator configuration.

use serde::{Deserialize, Serialize};

use crate::error::EventCleanError;
use crate::models::USER_ID_LENGTH;

/// Controls the size of the diagnostics the validator reports.
///
/// None of these settings change which rows are accepted; they only shape
/// the operator-facing report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Length a well-formed user id is expected to have
    pub expected_userid_length: usize,
    /// Number of earliest and latest event dates listed by the date range profile
    pub extremes_limit: usize,
    /// Maximum distinct values listed per low-cardinality column
    pub distinct_limit: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            expected_userid_length: USER_ID_LENGTH,
            extremes_limit: 5,
            distinct_limit: 50,
        }
    }
}

impl ValidatorConfig {
    /// Creates a new validator config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the number of extreme dates reported.
    pub fn with_extremes_limit(mut self, limit: usize) -> Self {
        self.extremes_limit = limit;
        self
    }

    /// Builder method to set the distinct-value listing limit.
    pub fn with_distinct_limit(mut self, limit: usize) -> Self {
        self.distinct_limit = limit;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.expected_userid_length == 0 {
            return Err(EventCleanError::configuration(
                "expected_userid_length must be greater than zero",
            ));
        }
        if self.extremes_limit == 0 {
            return Err(EventCleanError::configuration(
                "extremes_limit must be greater than zero",
            ));
        }
        if self.distinct_limit == 0 {
            return Err(EventCleanError::configuration(
                "distinct_limit must be greater than zero",
            ));
        }
        Ok(())
    }
}
