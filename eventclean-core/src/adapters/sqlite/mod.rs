//! SQLite record store.
//!
//! Used for local runs and tests. Dates are stored as ISO-8601 text, which
//! compares lexicographically in date order, so the window constraint is a
//! plain `BETWEEN` on text.

pub mod connection;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, warn};

use super::schema::{self, Dialect, INSERT_CHUNK_ROWS};
use super::{CanonicalRows, ConnectionConfig, RecordStore, StoreBackend, line_from_db, line_to_db};
use crate::Result;
use crate::config::ValidityWindow;
use crate::error::EventCleanError;
use crate::models::{
    EventRecord, RecordKind, StagingEventRecord, StagingUserRecord, UserRecord,
};

pub use connection::{is_in_memory, parse_sqlite_connection_config};

/// SQLite-backed [`RecordStore`].
pub struct SqliteStore {
    pool: SqlitePool,
    config: ConnectionConfig,
    in_memory: bool,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("config", &self.config)
            .field("in_memory", &self.in_memory)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens a SQLite store.
    pub async fn connect(connection_string: &str, config: ConnectionConfig) -> Result<Self> {
        let config = parse_sqlite_connection_config(connection_string, config)?;
        let pool = connection::create_sqlite_pool(connection_string, &config).await?;

        Ok(Self {
            pool,
            config,
            in_memory: is_in_memory(connection_string),
        })
    }

    /// Checks if the store is an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    async fn begin(&self, table: &str) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .map_err(|e| EventCleanError::from_sqlx(table, "Failed to begin transaction", e))
    }
}

/// Commits on success; rolls back explicitly on failure and returns the
/// original error.
async fn finish(tx: Transaction<'static, Sqlite>, outcome: Result<()>, table: &str) -> Result<()> {
    match outcome {
        Ok(()) => tx
            .commit()
            .await
            .map_err(|e| EventCleanError::from_sqlx(table, "Failed to commit transaction", e)),
        Err(error) => {
            if let Err(rollback_error) = tx.rollback().await {
                warn!("Rollback after failed write to {} also failed: {}", table, rollback_error);
            }
            Err(error)
        }
    }
}

async fn execute_all(conn: &mut SqliteConnection, statements: &[String], table: &str) -> Result<()> {
    for statement in statements {
        sqlx::query(statement.as_str())
            .execute(&mut *conn)
            .await
            .map_err(|e| EventCleanError::from_sqlx(table, "Failed to execute DDL", e))?;
    }
    Ok(())
}

async fn write_staging(
    conn: &mut SqliteConnection,
    users: &[StagingUserRecord],
    events: &[StagingEventRecord],
) -> Result<()> {
    let users_table = RecordKind::Users.staging_table();
    let events_table = RecordKind::Events.staging_table();

    execute_all(conn, &schema::staging_ddl(), users_table).await?;

    for chunk in users.chunks(INSERT_CHUNK_ROWS) {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "INSERT INTO {} (source_line, userid, subscriber, category) ",
            users_table
        ));
        builder.push_values(chunk, |mut row, user| {
            row.push_bind(line_to_db(user.source_line))
                .push_bind(user.userid.as_deref())
                .push_bind(user.subscriber.as_deref())
                .push_bind(user.category.as_deref());
        });
        builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(|e| EventCleanError::from_sqlx(users_table, "Failed to stage rows", e))?;
    }

    for chunk in events.chunks(INSERT_CHUNK_ROWS) {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "INSERT INTO {} (source_line, userid, event_date, hour, points) ",
            events_table
        ));
        builder.push_values(chunk, |mut row, event| {
            row.push_bind(line_to_db(event.source_line))
                .push_bind(event.userid.as_deref())
                .push_bind(event.event_date.as_deref())
                .push_bind(event.hour.as_deref())
                .push_bind(event.points.as_deref());
        });
        builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(|e| EventCleanError::from_sqlx(events_table, "Failed to stage rows", e))?;
    }

    Ok(())
}

async fn write_canonical(
    conn: &mut SqliteConnection,
    rows: CanonicalRows<'_>,
    window: &ValidityWindow,
) -> Result<()> {
    let users_table = RecordKind::Users.canonical_table();
    let events_table = RecordKind::Events.canonical_table();

    execute_all(conn, &schema::canonical_ddl(Dialect::Sqlite, window), users_table).await?;

    for chunk in rows.users.chunks(INSERT_CHUNK_ROWS) {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "INSERT INTO {} (userid, subscriber, category) ",
            users_table
        ));
        builder.push_values(chunk, |mut row, user| {
            row.push_bind(user.userid.as_str())
                .push_bind(user.subscriber_flag())
                .push_bind(user.category.as_str());
        });
        builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(|e| EventCleanError::from_sqlx(users_table, "Failed to insert users", e))?;
    }

    for chunk in rows.events.chunks(INSERT_CHUNK_ROWS) {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "INSERT INTO {} (userid, event_date, hour, points) ",
            events_table
        ));
        builder.push_values(chunk, |mut row, event| {
            row.push_bind(event.userid.as_str())
                .push_bind(event.event_date)
                .push_bind(event.hour.value())
                .push_bind(event.points);
        });
        builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(|e| EventCleanError::from_sqlx(events_table, "Failed to insert events", e))?;
    }

    Ok(())
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn test_connection(&self) -> Result<()> {
        let connectivity_result: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(EventCleanError::connection_failed)?;

        if connectivity_result != 1 {
            return Err(EventCleanError::configuration(
                "Basic connectivity test failed: unexpected result",
            ));
        }
        Ok(())
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Sqlite
    }

    fn connection_config(&self) -> ConnectionConfig {
        self.config.clone()
    }

    async fn replace_staging(
        &self,
        users: &[StagingUserRecord],
        events: &[StagingEventRecord],
    ) -> Result<()> {
        let table = RecordKind::Users.staging_table();
        let mut tx = self.begin(table).await?;
        let outcome = write_staging(&mut tx, users, events).await;
        finish(tx, outcome, table).await?;

        debug!("Staged {} user and {} event rows", users.len(), events.len());
        Ok(())
    }

    async fn fetch_staging_users(&self) -> Result<Vec<StagingUserRecord>> {
        let table = RecordKind::Users.staging_table();
        let rows: Vec<(i64, Option<String>, Option<String>, Option<String>)> =
            sqlx::query_as(&schema::select_staging_users())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| EventCleanError::from_sqlx(table, "Failed to read staging", e))?;

        Ok(rows
            .into_iter()
            .map(|(line, userid, subscriber, category)| StagingUserRecord {
                source_line: line_from_db(line),
                userid,
                subscriber,
                category,
            })
            .collect())
    }

    async fn fetch_staging_events(&self) -> Result<Vec<StagingEventRecord>> {
        let table = RecordKind::Events.staging_table();
        type Row = (i64, Option<String>, Option<String>, Option<String>, Option<String>);
        let rows: Vec<Row> = sqlx::query_as(&schema::select_staging_events())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EventCleanError::from_sqlx(table, "Failed to read staging", e))?;

        Ok(rows
            .into_iter()
            .map(|(line, userid, event_date, hour, points)| StagingEventRecord {
                source_line: line_from_db(line),
                userid,
                event_date,
                hour,
                points,
            })
            .collect())
    }

    async fn drop_staging(&self) -> Result<()> {
        let table = RecordKind::Users.staging_table();
        let mut tx = self.begin(table).await?;
        let outcome = execute_all(&mut tx, &schema::drop_staging_ddl(), table).await;
        finish(tx, outcome, table).await
    }

    async fn replace_canonical(
        &self,
        rows: CanonicalRows<'_>,
        window: &ValidityWindow,
    ) -> Result<()> {
        let table = RecordKind::Users.canonical_table();
        let mut tx = self.begin(table).await?;
        let outcome = write_canonical(&mut tx, rows, window).await;
        finish(tx, outcome, table).await?;

        debug!(
            "Committed {} users and {} events",
            rows.users.len(),
            rows.events.len()
        );
        Ok(())
    }

    async fn fetch_canonical_users(&self) -> Result<Vec<UserRecord>> {
        let table = RecordKind::Users.canonical_table();
        let rows: Vec<(String, i32, String)> = sqlx::query_as(&schema::select_canonical_users())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EventCleanError::from_sqlx(table, "Failed to read canonical", e))?;

        rows.into_iter()
            .map(|(userid, subscriber, category)| {
                super::decode_user(&userid, subscriber, &category)
            })
            .collect()
    }

    async fn fetch_canonical_events(&self) -> Result<Vec<EventRecord>> {
        let table = RecordKind::Events.canonical_table();
        let rows: Vec<(String, NaiveDate, i32, i64)> =
            sqlx::query_as(&schema::select_canonical_events())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| EventCleanError::from_sqlx(table, "Failed to read canonical", e))?;

        rows.into_iter()
            .map(|(userid, event_date, hour, points)| {
                super::decode_event(&userid, event_date, hour, points)
            })
            .collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
