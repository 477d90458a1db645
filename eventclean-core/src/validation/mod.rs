//! Staging validation.
//!
//! A fixed battery of read-only checks over a staging snapshot:
//! - **Completeness**: null required fields
//! - **Uniqueness**: repeated keys as entered
//! - **Anomaly**: user id length distribution and outliers
//! - **Consistency**: type-coercion check and points character class
//! - **Profile**: date extremes, distinct values and orphan references
//!
//! Findings name source lines and literal values. They are operator
//! diagnostics; the normalizer makes the actual decisions.

mod anomaly;
mod completeness;
mod config;
mod consistency;
mod models;
mod profile;
mod uniqueness;
mod validator;

pub use config::ValidatorConfig;
pub use models::{
    CharacterFinding, CoercionFailure, ColumnNulls, CompletenessFindings, ConsistencyFindings,
    DateExtreme, DateRangeProfile, DistinctValues, DuplicateGroup, LengthAnomaly, LengthBucket,
    LengthFindings, ProfileFindings, ReferenceProfile, TableReport, TargetType, UniquenessFindings,
    ValidationReport, ValueCount,
};
pub use validator::Validator;
