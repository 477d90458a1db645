//! Row-level dispositions produced by the normalizer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::Field;

/// Why a staging row was excluded from canonical output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RejectReason {
    /// A required field was null
    MissingValue { field: Field },
    /// User id is not 36 characters even after repair
    MalformedUserId { length: usize },
    /// Event date text could not be parsed
    UnparseableDate { value: String },
    /// Event date precedes the founding date
    DateBeforeFounding { date: String },
    /// Event date follows the analysis cutoff
    DateAfterCutoff { date: String },
    /// Value could not be cast to an integer
    NotAnInteger { field: Field, value: String },
    /// Value cast cleanly but lies outside the declared domain
    OutOfDomain { field: Field, value: String },
    /// An earlier row already claimed the same canonical key
    DuplicateKey { first_source_line: u64 },
    /// A rule declared this anomaly class as reject-only
    RuleRejected { class: String },
}

impl RejectReason {
    /// Stable reason code used in summaries and reports.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingValue { .. } => "missing_value",
            Self::MalformedUserId { .. } => "malformed_userid",
            Self::UnparseableDate { .. } => "unparseable_date",
            Self::DateBeforeFounding { .. } => "date_before_founding",
            Self::DateAfterCutoff { .. } => "date_after_cutoff",
            Self::NotAnInteger { .. } => "not_an_integer",
            Self::OutOfDomain { .. } => "out_of_domain",
            Self::DuplicateKey { .. } => "duplicate_key",
            Self::RuleRejected { .. } => "rule_rejected",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingValue { field } => write!(f, "{} is null", field),
            Self::MalformedUserId { length } => {
                write!(f, "userid has {} characters after repair", length)
            }
            Self::UnparseableDate { value } => write!(f, "event_date '{}' is not a date", value),
            Self::DateBeforeFounding { date } => write!(f, "event_date {} precedes founding", date),
            Self::DateAfterCutoff { date } => write!(f, "event_date {} follows cutoff", date),
            Self::NotAnInteger { field, value } => {
                write!(f, "{} '{}' is not an integer", field, value)
            }
            Self::OutOfDomain { field, value } => {
                write!(f, "{} '{}' is outside its domain", field, value)
            }
            Self::DuplicateKey { first_source_line } => {
                write!(f, "duplicate of source line {}", first_source_line)
            }
            Self::RuleRejected { class } => write!(f, "{} is configured to reject", class),
        }
    }
}

/// One field-level repair applied to an accepted row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRepair {
    /// Repaired column
    pub field: Field,
    /// Value as staged
    pub original: String,
    /// Value after stripping
    pub repaired: String,
}

/// Accept, repair or reject decision for one staging row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum Disposition<T> {
    /// Every field was already canonical
    AcceptAsIs { record: T },
    /// Accepted after the listed repairs
    AcceptRepaired { record: T, repairs: Vec<FieldRepair> },
    /// Excluded from canonical output
    Reject { reason: RejectReason },
}

impl<T> Disposition<T> {
    /// Builds an accept decision, repaired if any repair was applied.
    pub fn accept(record: T, repairs: Vec<FieldRepair>) -> Self {
        if repairs.is_empty() {
            Self::AcceptAsIs { record }
        } else {
            Self::AcceptRepaired { record, repairs }
        }
    }

    /// The canonical record, if accepted.
    pub fn record(&self) -> Option<&T> {
        match self {
            Self::AcceptAsIs { record } | Self::AcceptRepaired { record, .. } => Some(record),
            Self::Reject { .. } => None,
        }
    }

    /// The rejection reason, if rejected.
    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            Self::Reject { reason } => Some(reason),
            _ => None,
        }
    }

    /// Returns true for accepted rows, repaired or not.
    pub fn is_accepted(&self) -> bool {
        self.record().is_some()
    }
}

/// Decision for a staging row, keyed by its source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowDecision<T> {
    /// Staging row the decision applies to
    pub source_line: u64,
    /// What happened to the row
    #[serde(flatten)]
    pub disposition: Disposition<T>,
}

/// Disposition counts for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispositionSummary {
    /// Rows accepted unchanged
    pub accepted_as_is: u64,
    /// Rows accepted after repair
    pub repaired: u64,
    /// Rows rejected
    pub rejected: u64,
    /// Rejection counts keyed by reason code
    pub rejections: BTreeMap<String, u64>,
    /// Repair counts keyed by column name
    pub repairs_by_field: BTreeMap<String, u64>,
}

impl DispositionSummary {
    /// Tallies a set of decisions.
    pub fn from_decisions<T>(decisions: &[RowDecision<T>]) -> Self {
        let mut summary = Self::default();
        for decision in decisions {
            match &decision.disposition {
                Disposition::AcceptAsIs { .. } => summary.accepted_as_is += 1,
                Disposition::AcceptRepaired { repairs, .. } => {
                    summary.repaired += 1;
                    for repair in repairs {
                        *summary
                            .repairs_by_field
                            .entry(repair.field.column_name().to_string())
                            .or_default() += 1;
                    }
                }
                Disposition::Reject { reason } => {
                    summary.rejected += 1;
                    *summary.rejections.entry(reason.code().to_string()).or_default() += 1;
                }
            }
        }
        summary
    }

    /// Rows that will reach canonical storage.
    pub fn accepted(&self) -> u64 {
        self.accepted_as_is + self.repaired
    }
}
