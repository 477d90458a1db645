//! Staging loader: raw delimited files into the unconstrained staging tables.
//!
//! Rows are kept exactly as written, malformed values included. Empty fields
//! and fields missing from short rows are staged as nulls so the validator
//! can report them. A quoted empty field (`""`) is indistinguishable from an
//! empty one once the reader has unquoted it, so it is staged as null too;
//! no canonical column accepts an empty string, so both end up rejected as
//! `missing_value`.
//!
//! A quoted field spanning a line break fails the load with the offending
//! row. Every required value is single-line, and an unbalanced quote would
//! otherwise swallow the rest of the file.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::adapters::RecordStore;
use crate::config::PipelineConfig;
use crate::error::EventCleanError;
use crate::models::{Field, StagingEventRecord, StagingSnapshot, StagingUserRecord};
use crate::Result;

/// Header positions of the required columns in one source file.
struct ColumnMap {
    positions: HashMap<Field, usize>,
}

impl ColumnMap {
    fn from_headers(path: &Path, headers: &csv::StringRecord, fields: &[Field]) -> Result<Self> {
        let mut positions = HashMap::with_capacity(fields.len());

        for field in fields {
            let position = headers
                .iter()
                .position(|header| {
                    header
                        .trim()
                        .trim_start_matches('\u{feff}')
                        .eq_ignore_ascii_case(field.column_name())
                })
                .ok_or_else(|| {
                    EventCleanError::source_format(
                        path,
                        format!("missing required column '{}'", field.column_name()),
                    )
                })?;
            positions.insert(*field, position);
        }

        Ok(Self { positions })
    }

    fn get(&self, record: &csv::StringRecord, field: Field) -> Option<String> {
        self.positions
            .get(&field)
            .and_then(|position| record.get(*position))
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| EventCleanError::csv(format!("Failed to open {}", path.display()), e))
}

/// Rejects a record whose quoted field runs across a line break.
///
/// An unbalanced quote makes the reader fold every following line into one
/// field, so the rows behind it would vanish from staging and from the audit
/// counts.
fn ensure_single_line(path: &Path, source_line: u64, record: &csv::StringRecord) -> Result<()> {
    if let Some(column) = record
        .iter()
        .position(|value| value.contains(['\n', '\r']))
    {
        let physical_line = record.position().map_or(0, csv::Position::line);
        return Err(EventCleanError::source_format(
            path,
            format!(
                "row {} (file line {}) has a quoted field in column {} spanning a line break; \
                 check for an unbalanced '\"'",
                source_line,
                physical_line,
                column + 1
            ),
        ));
    }
    Ok(())
}

fn read_rows<T>(
    path: &Path,
    fields: &[Field],
    build: impl Fn(u64, &ColumnMap, &csv::StringRecord) -> T,
) -> Result<Vec<T>> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|e| EventCleanError::csv(format!("Failed to read header of {}", path.display()), e))?
        .clone();
    let columns = ColumnMap::from_headers(path, &headers, fields)?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            EventCleanError::csv(format!("Failed to read {}", path.display()), e)
        })?;
        let source_line = u64::try_from(index).unwrap_or(u64::MAX).saturating_add(1);
        ensure_single_line(path, source_line, &record)?;
        rows.push(build(source_line, &columns, &record));
    }

    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Reads raw user records (`userid,subscriber,category`).
pub fn read_user_records(path: &Path) -> Result<Vec<StagingUserRecord>> {
    read_rows(path, &Field::USER_FIELDS, |source_line, columns, record| {
        StagingUserRecord {
            source_line,
            userid: columns.get(record, Field::UserId),
            subscriber: columns.get(record, Field::Subscriber),
            category: columns.get(record, Field::Category),
        }
    })
}

/// Reads raw event-participation records (`userid,event_date,hour,points`).
///
/// The canonical backup file has the same layout, so this is also the reader
/// used to reload an export.
pub fn read_event_records(path: &Path) -> Result<Vec<StagingEventRecord>> {
    read_rows(path, &Field::EVENT_FIELDS, |source_line, columns, record| {
        StagingEventRecord {
            source_line,
            userid: columns.get(record, Field::UserId),
            event_date: columns.get(record, Field::EventDate),
            hour: columns.get(record, Field::Hour),
            points: columns.get(record, Field::Points),
        }
    })
}

/// Loads both raw files into staging storage.
#[derive(Debug, Clone)]
pub struct StagingLoader<'a> {
    config: &'a PipelineConfig,
}

impl<'a> StagingLoader<'a> {
    /// Creates a loader for the configured input files.
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Reads both files completely from disk.
    pub fn read_sources(&self) -> Result<StagingSnapshot> {
        let users_path = self.config.users_path();
        let events_path = self.config.events_path();

        info!("Reading user records from {}", users_path.display());
        let users = read_user_records(&users_path)?;
        info!("Reading event records from {}", events_path.display());
        let events = read_event_records(&events_path)?;

        Ok(StagingSnapshot { users, events })
    }

    /// Destructively rebuilds staging from the raw files.
    ///
    /// Both sources are read in full before the store is touched; the store
    /// replaces both staging tables in one transaction.
    pub async fn load(&self, store: &dyn RecordStore) -> Result<StagingSnapshot> {
        let snapshot = self.read_sources()?;

        store
            .replace_staging(&snapshot.users, &snapshot.events)
            .await?;

        info!(
            "Staged {} user rows and {} event rows",
            snapshot.users.len(),
            snapshot.events.len()
        );
        Ok(snapshot)
    }
}
