//! Run state machine: load, validate, normalize, commit.
//!
//! ```text
//! EMPTY -> STAGED -> VALIDATED -> NORMALIZED -> CANONICAL
//! ```
//!
//! Each stage consumes the complete output of the previous one. Canonical
//! storage is touched only by the final transition, so a failure anywhere
//! leaves the previously committed canonical tables intact.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::Result;
use crate::adapters::{RecordStore, StoreBackend};
use crate::canonical::{CanonicalBatch, CanonicalWriter, export_events_backup};
use crate::config::{NullPolicy, PipelineConfig};
use crate::error::EventCleanError;
use crate::models::{RecordKind, StagingSnapshot};
use crate::normalize::{DispositionSummary, Normalizer, RuleSet};
use crate::staging::StagingLoader;
use crate::validation::{ValidationReport, Validator};

/// Pipeline run stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    /// Nothing loaded yet
    Empty,
    /// Raw rows are in the staging tables
    Staged,
    /// The validator has reported on the staged rows
    Validated,
    /// Every staged row has a disposition
    Normalized,
    /// Canonical tables replaced
    Canonical,
}

impl PipelineStage {
    /// Upper-case stage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::Staged => "STAGED",
            Self::Validated => "VALIDATED",
            Self::Normalized => "NORMALIZED",
            Self::Canonical => "CANONICAL",
        }
    }

    /// The stage that follows this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Empty => Some(Self::Staged),
            Self::Staged => Some(Self::Validated),
            Self::Validated => Some(Self::Normalized),
            Self::Normalized => Some(Self::Canonical),
            Self::Canonical => None,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit counts for one table.
///
/// Every loaded row is either accepted (as-is or repaired) or rejected.
///
/// # Example
///
/// ```
/// use eventclean_core::pipeline::TableCounts;
///
/// let counts = TableCounts {
///     loaded: 5,
///     flagged: 3,
///     accepted_as_is: 2,
///     repaired: 2,
///     rejected: 1,
///     ..Default::default()
/// };
/// assert_eq!(counts.accepted(), 4);
/// assert_eq!(counts.accepted() + counts.rejected, counts.loaded);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
    /// Rows staged from the raw file
    pub loaded: u64,
    /// Rows with at least one validator finding
    pub flagged: u64,
    /// Rows written to canonical storage unchanged
    pub accepted_as_is: u64,
    /// Rows written to canonical storage after at least one repair
    pub repaired: u64,
    /// Rows dropped before canonical storage
    pub rejected: u64,
    /// Rejection counts keyed by reason code
    pub rejections: BTreeMap<String, u64>,
    /// Repair counts keyed by column name
    pub repairs_by_field: BTreeMap<String, u64>,
}

impl TableCounts {
    fn new(kind: RecordKind, report: &ValidationReport, summary: DispositionSummary) -> Self {
        Self {
            loaded: report.table(kind).row_count,
            flagged: report.flagged_rows(kind).len() as u64,
            accepted_as_is: summary.accepted_as_is,
            repaired: summary.repaired,
            rejected: summary.rejected,
            rejections: summary.rejections,
            repairs_by_field: summary.repairs_by_field,
        }
    }

    /// Rows written to canonical storage.
    pub fn accepted(&self) -> u64 {
        self.accepted_as_is + self.repaired
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Last stage the run completed
    pub stage: PipelineStage,
    /// Store the run wrote to
    pub backend: StoreBackend,
    /// When the run started (UTC)
    pub started_at: DateTime<Utc>,
    /// When the run finished (UTC)
    pub finished_at: DateTime<Utc>,
    /// Counts for the user table
    pub users: TableCounts,
    /// Counts for the event-performance table
    pub events: TableCounts,
    /// Rule table the normalizer applied
    pub rules: RuleSet,
    /// Backup export location, when exported
    pub backup_path: Option<PathBuf>,
    /// Validator findings over the staged rows
    pub validation: ValidationReport,
}

/// Drives one run against a record store.
///
/// # Example
///
/// ```rust,no_run
/// use eventclean_core::adapters::{ConnectionConfig, create_store};
/// use eventclean_core::config::PipelineConfig;
/// use eventclean_core::pipeline::CleaningPipeline;
///
/// # async fn example() -> eventclean_core::Result<()> {
/// let store = create_store("sqlite://events.db", ConnectionConfig::default()).await?;
/// let mut pipeline = CleaningPipeline::new(PipelineConfig::new("/srv/analysis"))?;
/// let summary = pipeline.run(store.as_ref()).await?;
/// println!("{} events committed", summary.events.accepted());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CleaningPipeline {
    config: PipelineConfig,
    stage: PipelineStage,
}

impl CleaningPipeline {
    /// Creates a pipeline in the `EMPTY` stage.
    ///
    /// # Errors
    /// Returns a configuration error if the config does not validate.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stage: PipelineStage::Empty,
        })
    }

    /// The last stage reached.
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Configuration this pipeline runs with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn advance(&mut self, stage: PipelineStage) {
        self.stage = stage;
        info!("Pipeline reached {}", stage);
    }

    /// Loads staging, reads it back and validates it.
    async fn stage_and_validate(
        &mut self,
        store: &dyn RecordStore,
    ) -> Result<(StagingSnapshot, ValidationReport)> {
        self.stage = PipelineStage::Empty;

        store
            .test_connection()
            .await
            .map_err(|e| e.at_stage(PipelineStage::Staged))?;

        StagingLoader::new(&self.config)
            .load(store)
            .await
            .map_err(|e| e.at_stage(PipelineStage::Staged))?;
        self.advance(PipelineStage::Staged);

        let snapshot = store
            .fetch_staging()
            .await
            .map_err(|e| e.at_stage(PipelineStage::Validated))?;
        let report =
            Validator::new(self.config.validator.clone(), self.config.window).validate(&snapshot);
        self.advance(PipelineStage::Validated);

        Ok((snapshot, report))
    }

    /// Loads and validates without touching canonical storage.
    ///
    /// Staging is dropped afterwards unless `keep_staging` is set.
    pub async fn inspect(&mut self, store: &dyn RecordStore) -> Result<ValidationReport> {
        let (_, report) = self.stage_and_validate(store).await?;

        if !self.config.keep_staging {
            store
                .drop_staging()
                .await
                .map_err(|e| e.at_stage(PipelineStage::Validated))?;
        }
        Ok(report)
    }

    /// Executes every stage in order.
    ///
    /// # Errors
    /// Any failure is wrapped in `StageFailed` naming the stage the run was
    /// trying to reach. With [`NullPolicy::Abort`], null required fields fail
    /// the run at `VALIDATED`.
    pub async fn run(&mut self, store: &dyn RecordStore) -> Result<RunSummary> {
        let started_at = Utc::now();
        let window = self.config.window;

        let (snapshot, report) = self.stage_and_validate(store).await?;
        let null_rows = report.null_count();
        if null_rows > 0 {
            match self.config.null_policy {
                NullPolicy::Abort => {
                    self.stage = PipelineStage::Staged;
                    return Err(EventCleanError::NullsFound { count: null_rows }
                        .at_stage(PipelineStage::Validated));
                }
                NullPolicy::RejectRow => {
                    warn!("{} staging row(s) with nulls will be rejected", null_rows);
                }
            }
        }

        let outcome = Normalizer::new(window, self.config.rules.clone()).normalize(&snapshot);
        self.advance(PipelineStage::Normalized);

        let batch = CanonicalBatch::from_outcome(&outcome, &window)
            .map_err(|e| e.at_stage(PipelineStage::Canonical))?;
        CanonicalWriter::commit(store, &batch, &window)
            .await
            .map_err(|e| e.at_stage(PipelineStage::Canonical))?;

        let backup_path = if self.config.export_backup {
            let path = self.config.backup_path();
            export_events_backup(batch.events(), &path)
                .await
                .map_err(|e| e.at_stage(PipelineStage::Canonical))?;
            Some(path)
        } else {
            None
        };

        if !self.config.keep_staging {
            store
                .drop_staging()
                .await
                .map_err(|e| e.at_stage(PipelineStage::Canonical))?;
        }
        self.advance(PipelineStage::Canonical);

        let summary = RunSummary {
            stage: self.stage,
            backend: store.backend(),
            started_at,
            finished_at: Utc::now(),
            users: TableCounts::new(RecordKind::Users, &report, outcome.user_summary()),
            events: TableCounts::new(RecordKind::Events, &report, outcome.event_summary()),
            rules: self.config.rules.clone(),
            backup_path,
            validation: report,
        };

        info!(
            "Run complete: users {} loaded, {} accepted, {} rejected; events {} loaded, {} accepted, {} rejected",
            summary.users.loaded,
            summary.users.accepted(),
            summary.users.rejected,
            summary.events.loaded,
            summary.events.accepted(),
            summary.events.rejected
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let mut stage = PipelineStage::Empty;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            assert!(next > stage);
            seen.push(next);
            stage = next;
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(stage, PipelineStage::Canonical);
    }

    #[test]
    fn test_stage_display_and_serde() {
        assert_eq!(PipelineStage::Normalized.to_string(), "NORMALIZED");
        assert_eq!(
            serde_json::to_string(&PipelineStage::Canonical).unwrap(),
            "\"CANONICAL\""
        );
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = PipelineConfig {
            backup_file_name: String::new(),
            ..Default::default()
        };
        assert!(CleaningPipeline::new(config).is_err());

        let pipeline = CleaningPipeline::new(PipelineConfig::default()).unwrap();
        assert_eq!(pipeline.stage(), PipelineStage::Empty);
    }

    #[test]
    fn test_table_counts_from_summary() {
        let report = Validator::with_defaults(Default::default())
            .validate(&crate::models::StagingSnapshot::default());
        let summary = DispositionSummary {
            accepted_as_is: 4,
            repaired: 2,
            rejected: 1,
            ..Default::default()
        };
        let counts = TableCounts::new(RecordKind::Events, &report, summary);
        assert_eq!(counts.accepted(), 6);
        assert_eq!(counts.loaded, 0);
    }
}
