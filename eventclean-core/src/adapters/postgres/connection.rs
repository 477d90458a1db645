//! PostgreSQL connection pool management and validation.
//!
//! # Security Features
//! - Validates connection string format and parameters
//! - Enforces connection limits to prevent resource exhaustion
//! - Sets statement and lock timeouts on every pooled connection
//! - Never stores or logs the password

use std::time::Duration;

use sqlx::PgPool;
use url::Url;

use super::ConnectionConfig;
use crate::Result;
use crate::adapters::DEFAULT_POSTGRES_PORT;
use crate::error::EventCleanError;

/// Longest identifier PostgreSQL accepts.
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validates connection string format.
///
/// # Errors
/// Returns error if the string is not a `postgres://` or `postgresql://` URL
/// or names no host.
pub fn validate_connection_string(connection_string: &str) -> Result<()> {
    if !connection_string.starts_with("postgres://")
        && !connection_string.starts_with("postgresql://")
    {
        return Err(EventCleanError::configuration(
            "Invalid PostgreSQL connection string format: expected postgres:// or postgresql://",
        ));
    }

    let url = Url::parse(connection_string).map_err(|e| {
        EventCleanError::configuration(format!(
            "Invalid PostgreSQL connection string format: {}",
            e
        ))
    })?;

    if url.host_str().is_none_or(str::is_empty) {
        return Err(EventCleanError::configuration(
            "PostgreSQL connection string must specify a host",
        ));
    }

    Ok(())
}

fn check_identifier(kind: &str, value: &str) -> Result<()> {
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(EventCleanError::configuration(format!(
            "{} too long: maximum {} characters",
            kind, MAX_IDENTIFIER_LENGTH
        )));
    }
    if let Some(first) = value.chars().next()
        && !first.is_ascii_alphabetic()
        && first != '_'
    {
        return Err(EventCleanError::configuration(format!(
            "{} must start with a letter or underscore",
            kind
        )));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    {
        return Err(EventCleanError::configuration(format!(
            "{} contains invalid characters (only letters, digits, underscores, and dollar signs allowed)",
            kind
        )));
    }
    Ok(())
}

/// Parses a connection string into connection parameters.
///
/// Host, port, database and username come from the URL; timeouts and pool
/// size start from `base` and may be overridden by the `connect_timeout`
/// (seconds), `statement_timeout` (milliseconds) and `pool_max_conns` query
/// parameters. Out-of-range overrides are ignored.
///
/// # Errors
/// Returns error if the connection string is malformed, names no database,
/// or carries an invalid identifier.
pub fn parse_connection_config(
    connection_string: &str,
    base: ConnectionConfig,
) -> Result<ConnectionConfig> {
    validate_connection_string(connection_string)?;

    let url = Url::parse(connection_string).map_err(|e| {
        EventCleanError::configuration(format!(
            "Invalid PostgreSQL connection string format: {}",
            e
        ))
    })?;

    let mut config = ConnectionConfig {
        host: url.host_str().unwrap_or("localhost").to_string(),
        port: Some(url.port().unwrap_or(DEFAULT_POSTGRES_PORT)),
        database: None,
        username: None,
        ..base
    };

    let database = url.path().trim_start_matches('/');
    if database.is_empty() {
        return Err(EventCleanError::configuration(
            "PostgreSQL connection string must name a database",
        ));
    }
    check_identifier("Database name", database)?;
    config = config.with_database(database.to_string());

    let username = url.username();
    if !username.is_empty() {
        check_identifier("Username", username)?;
        config = config.with_username(username.to_string());
    }

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "connect_timeout" => {
                if let Ok(timeout_secs) = value.parse::<u64>()
                    && timeout_secs > 0
                    && timeout_secs <= 300
                {
                    config.connect_timeout = Duration::from_secs(timeout_secs);
                }
            }
            "statement_timeout" => {
                if let Ok(timeout_ms) = value.parse::<u64>()
                    && timeout_ms > 0
                    && timeout_ms <= 3_600_000
                {
                    config.query_timeout = Duration::from_millis(timeout_ms);
                }
            }
            "pool_max_conns" => {
                if let Ok(max_conns) = value.parse::<u32>()
                    && max_conns > 0
                    && max_conns <= 100
                {
                    config.max_connections = max_conns;
                }
            }
            _ => {}
        }
    }

    config.validate()?;
    Ok(config)
}

/// Creates a lazily connecting pool with session settings on every connection.
///
/// Nothing is dialed until the first query, so an unreachable server shows up
/// in [`super::PostgresStore`]'s `test_connection`, not here.
pub(crate) fn create_connection_pool(
    connection_string: &str,
    config: &ConnectionConfig,
) -> Result<PgPool> {
    use sqlx::Executor;

    let query_timeout_ms = config.query_timeout.as_millis();

    sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.max_connections.min(100))
        .min_connections(0)
        .acquire_timeout(config.connect_timeout)
        .test_before_acquire(true)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                conn.execute(format!("SET statement_timeout = '{}ms'", query_timeout_ms).as_str())
                    .await?;
                conn.execute("SET lock_timeout = '30s'").await?;

                let app_name = format!("eventclean-{}", env!("CARGO_PKG_VERSION"));
                conn.execute(format!("SET application_name = '{}'", app_name).as_str())
                    .await?;

                // DATE columns carry no zone, but keep session output stable
                conn.execute("SET timezone = 'UTC'").await?;

                Ok(())
            })
        })
        .connect_lazy(connection_string)
        .map_err(|e| EventCleanError::Connection {
            context: format!(
                "Failed to create PostgreSQL connection pool to {}",
                crate::adapters::redact_database_url(connection_string)
            ),
            source: Box::new(e),
        })
}
