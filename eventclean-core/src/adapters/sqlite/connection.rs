//! SQLite connection handling.
//!
//! # Connection Modes
//! - File-based: `sqlite:///path/to/events.db` or `sqlite://./relative.db`
//! - In-memory: `sqlite::memory:`
//!
//! The pool holds exactly one connection that never expires. An in-memory
//! database lives only as long as its connection, so letting the pool recycle
//! it would silently discard both staging and canonical tables.

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::ConnectionConfig;
use crate::Result;
use crate::error::EventCleanError;

/// Returns true for in-memory connection strings.
pub fn is_in_memory(connection_string: &str) -> bool {
    connection_string.contains(":memory:") || connection_string.contains("mode=memory")
}

/// Describes a SQLite connection string as connection parameters.
///
/// Timeouts come from `base`; SQLite has no host, port or credentials.
pub fn parse_sqlite_connection_config(
    connection_string: &str,
    base: ConnectionConfig,
) -> Result<ConnectionConfig> {
    if !connection_string.starts_with("sqlite:") {
        return Err(EventCleanError::configuration(
            "Invalid SQLite connection string format: expected sqlite:// URL or sqlite::memory:",
        ));
    }

    Ok(ConnectionConfig {
        host: "localhost".to_string(),
        port: None,
        database: Some(extract_database_name(connection_string)),
        username: None,
        max_connections: 1,
        ..base
    })
}

/// Extracts the database file name from a connection string.
fn extract_database_name(connection_string: &str) -> String {
    if is_in_memory(connection_string) {
        return ":memory:".to_string();
    }

    let path = connection_string
        .trim_start_matches("sqlite:")
        .trim_start_matches("//");
    let path = path.split('?').next().unwrap_or(path);

    match path.rsplit('/').next() {
        Some(filename) if !filename.is_empty() => filename.to_string(),
        _ => "main".to_string(),
    }
}

/// Opens the single-connection pool, creating the database file if needed.
pub(crate) async fn create_sqlite_pool(
    connection_string: &str,
    config: &ConnectionConfig,
) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(connection_string)
        .map_err(|e| {
            EventCleanError::configuration(format!("Invalid SQLite connection string: {}", e))
        })?
        .create_if_missing(true)
        .busy_timeout(config.query_timeout);

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(|e| EventCleanError::Connection {
            context: format!(
                "Failed to open SQLite database {}",
                extract_database_name(connection_string)
            ),
            source: Box::new(e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_in_memory() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://file:events?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite:///var/lib/events.db"));
    }

    #[test]
    fn test_extract_database_name() {
        assert_eq!(extract_database_name("sqlite::memory:"), ":memory:");
        assert_eq!(extract_database_name("sqlite:///path/to/events.db"), "events.db");
        assert_eq!(extract_database_name("sqlite://./test.db"), "test.db");
        assert_eq!(extract_database_name("sqlite://events.db?mode=rwc"), "events.db");
    }

    #[test]
    fn test_parse_sqlite_connection_config() {
        let config =
            parse_sqlite_connection_config("sqlite:///path/to/test.db", ConnectionConfig::default())
                .unwrap();
        assert_eq!(config.database, Some("test.db".to_string()));
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.port, None);

        assert!(
            parse_sqlite_connection_config("postgres://localhost/db", ConnectionConfig::default())
                .is_err()
        );
    }
}
