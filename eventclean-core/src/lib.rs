//! Core library for eventclean.
//!
//! Turns two loosely typed raw files (users and event participation) into a
//! constraint-valid canonical dataset in a relational store. A run moves
//! through four stages, each consuming the complete output of the last:
//! staging load, validation, normalization and canonical commit.
//!
//! # Guarantees
//! - Row-level problems never abort a run; they become findings or
//!   rejections with a stable reason code
//! - Canonical tables are replaced in a single transaction or not at all
//! - No credentials stored or logged in any data structures
//!
//! # Architecture
//! - Trait-based store access ([`adapters::RecordStore`]) with PostgreSQL and
//!   SQLite backends behind feature flags
//! - Read-only validator producing an operator report
//! - Declared rule table driving the normalizer's decisions
//! - Error handling with credential sanitization

pub mod adapters;
pub mod canonical;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod security;
pub mod staging;
pub mod validation;

// Re-export commonly used types
pub use adapters::{ConnectionConfig, RecordStore, StoreBackend, create_store};
pub use config::{NullPolicy, PipelineConfig, ValidityWindow};
pub use error::{EventCleanError, Result};
pub use models::{EventRecord, StagingSnapshot, UserRecord};
pub use normalize::{NormalizationOutcome, Normalizer, RuleSet};
pub use pipeline::{CleaningPipeline, PipelineStage, RunSummary};
pub use security::Credentials;
pub use validation::{ValidationReport, Validator};
