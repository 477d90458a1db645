//! Canonical batch assembly, commit and backup export.
//!
//! The batch is the last line of defence before the store: it re-checks the
//! canonical invariants over the normalizer's accepted rows. A failure here
//! means a rule let a bad row through, so it is reported as a constraint
//! violation rather than silently dropped.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::Result;
use crate::adapters::{CanonicalRows, RecordStore};
use crate::config::ValidityWindow;
use crate::error::EventCleanError;
use crate::models::{EventRecord, RecordKind, StagingEventRecord, UserRecord};
use crate::normalize::NormalizationOutcome;
use crate::staging::read_event_records;

/// Accepted rows in deterministic order, ready to replace canonical storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalBatch {
    users: Vec<UserRecord>,
    events: Vec<EventRecord>,
}

impl CanonicalBatch {
    /// Collects accepted rows from a normalization outcome.
    ///
    /// Users are ordered by id and events by `(userid, event_date, hour,
    /// points)`, so identical input always yields an identical batch.
    ///
    /// # Errors
    /// Returns `ConstraintViolation` if two accepted users share an id or an
    /// accepted event lies outside the window.
    pub fn from_outcome(outcome: &NormalizationOutcome, window: &ValidityWindow) -> Result<Self> {
        let mut users: Vec<UserRecord> = outcome.accepted_users().cloned().collect();
        let mut events: Vec<EventRecord> = outcome.accepted_events().cloned().collect();

        let mut seen = HashSet::with_capacity(users.len());
        for user in &users {
            if !seen.insert(&user.userid) {
                return Err(EventCleanError::constraint_violation(
                    RecordKind::Users.canonical_table(),
                    format!("user id {} accepted more than once", user.userid),
                ));
            }
        }

        if let Some(event) = events.iter().find(|e| !window.contains(e.event_date)) {
            return Err(EventCleanError::constraint_violation(
                RecordKind::Events.canonical_table(),
                format!(
                    "event date {} accepted outside {}..={}",
                    event.event_date, window.founding_date, window.cutoff_date
                ),
            ));
        }

        users.sort_by(|a, b| a.userid.cmp(&b.userid));
        events.sort();

        Ok(Self { users, events })
    }

    /// Borrowed view passed to the store.
    pub fn rows(&self) -> CanonicalRows<'_> {
        CanonicalRows {
            users: &self.users,
            events: &self.events,
        }
    }

    /// Accepted users ordered by id.
    pub fn users(&self) -> &[UserRecord] {
        &self.users
    }

    /// Accepted events ordered by `(userid, event_date, hour, points)`.
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }
}

/// Replaces canonical storage with a batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalWriter;

impl CanonicalWriter {
    /// Commits the batch in a single store transaction.
    ///
    /// On failure the previous canonical tables are left as they were.
    pub async fn commit(
        store: &dyn RecordStore,
        batch: &CanonicalBatch,
        window: &ValidityWindow,
    ) -> Result<()> {
        store.replace_canonical(batch.rows(), window).await?;
        info!(
            "Committed {} users and {} events to canonical storage",
            batch.users.len(),
            batch.events.len()
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct BackupRow<'a> {
    userid: &'a str,
    event_date: String,
    hour: i32,
    points: i64,
}

/// Writes canonical events to a comma-separated backup file.
///
/// The header is `userid,event_date,hour,points` and dates are ISO-8601.
/// Missing parent directories are created.
pub async fn export_events_backup(events: &[EventRecord], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    // An empty table still gets its header
    if events.is_empty() {
        writer
            .write_record(["userid", "event_date", "hour", "points"])
            .map_err(|e| EventCleanError::csv("Failed to write backup header", e))?;
    }
    for event in events {
        writer
            .serialize(BackupRow {
                userid: event.userid.as_str(),
                event_date: event.event_date.format("%Y-%m-%d").to_string(),
                hour: event.hour.value(),
                points: event.points,
            })
            .map_err(|e| EventCleanError::csv("Failed to write backup row", e))?;
    }
    let data = writer
        .into_inner()
        .map_err(|e| EventCleanError::Io {
            context: "Failed to flush backup buffer".to_string(),
            source: e.into_error(),
        })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| EventCleanError::Io {
                context: format!("Failed to create {}", parent.display()),
                source: e,
            })?;
    }

    tokio::fs::write(path, data)
        .await
        .map_err(|e| EventCleanError::Io {
            context: format!("Failed to write to {}", path.display()),
            source: e,
        })?;

    info!("Exported {} events to {}", events.len(), path.display());
    Ok(())
}

/// Reloads a backup file as staging rows.
///
/// Going through the staging reader means the reloaded rows face exactly the
/// same normalization as raw input.
pub fn read_events_backup(path: &Path) -> Result<Vec<StagingEventRecord>> {
    read_event_records(path)
}
