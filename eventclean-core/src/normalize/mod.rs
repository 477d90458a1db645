//! Normalization: repair or reject staging values and coerce them into
//! canonical types.
//!
//! - **Rules**: the declared anomaly-class to action table
//! - **Coercion**: date and integer casts plus character-class repairs
//! - **Decisions**: per-row accept, repair or reject outcomes
//!
//! Normalization never mutates staging data and never fails on a row; each
//! row's problems become a [`RejectReason`].

pub mod coerce;
mod decisions;
mod normalizer;
mod rules;

pub use decisions::{Disposition, DispositionSummary, FieldRepair, RejectReason, RowDecision};
pub use normalizer::{NormalizationOutcome, Normalizer};
pub use rules::{AnomalyClass, RuleAction, RuleSet};
