//! Staging and canonical DDL for each supported dialect.
//!
//! Staging tables are deliberately unconstrained: every column is text and
//! nullable, plus a `source_line` ordinal. Canonical tables carry every
//! declared domain constraint, with the event-date window rendered from the
//! run's [`ValidityWindow`]. Each entry is a single statement so it can be
//! executed through a prepared query.

use crate::config::ValidityWindow;
use crate::models::RecordKind;

/// SQL dialect of a backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// PostgreSQL
    Postgres,
    /// SQLite
    Sqlite,
}

/// Rows per multi-row INSERT.
///
/// Five bound columns per row keeps a chunk well under both PostgreSQL's
/// 65535 and SQLite's 32766 parameter limits.
pub const INSERT_CHUNK_ROWS: usize = 1000;

/// Drops and recreates both staging tables.
pub fn staging_ddl() -> Vec<String> {
    let users = RecordKind::Users.staging_table();
    let events = RecordKind::Events.staging_table();
    vec![
        format!("DROP TABLE IF EXISTS {}", users),
        format!("DROP TABLE IF EXISTS {}", events),
        format!(
            "CREATE TABLE {} (\
             source_line BIGINT NOT NULL, \
             userid TEXT, \
             subscriber TEXT, \
             category TEXT)",
            users
        ),
        format!(
            "CREATE TABLE {} (\
             source_line BIGINT NOT NULL, \
             userid TEXT, \
             event_date TEXT, \
             hour TEXT, \
             points TEXT)",
            events
        ),
    ]
}

/// Drops both staging tables.
pub fn drop_staging_ddl() -> Vec<String> {
    vec![
        format!("DROP TABLE IF EXISTS {}", RecordKind::Users.staging_table()),
        format!("DROP TABLE IF EXISTS {}", RecordKind::Events.staging_table()),
    ]
}

/// Drops and recreates both canonical tables with their constraints.
pub fn canonical_ddl(dialect: Dialect, window: &ValidityWindow) -> Vec<String> {
    let users = RecordKind::Users.canonical_table();
    let events = RecordKind::Events.canonical_table();
    let founding = window.founding_date.format("%Y-%m-%d");
    let cutoff = window.cutoff_date.format("%Y-%m-%d");

    let (users_table, events_table) = match dialect {
        Dialect::Postgres => (
            format!(
                "CREATE TABLE {} (\
                 userid VARCHAR(36) PRIMARY KEY \
                 CONSTRAINT valid_userid CHECK (char_length(userid) = 36), \
                 subscriber INT NOT NULL \
                 CONSTRAINT valid_subscriber CHECK (subscriber IN (0, 1)), \
                 category CHAR(1) NOT NULL \
                 CONSTRAINT valid_category CHECK (category IN ('A', 'B', 'C')))",
                users
            ),
            format!(
                "CREATE TABLE {} (\
                 userid VARCHAR(36) NOT NULL \
                 CONSTRAINT valid_event_userid CHECK (char_length(userid) = 36), \
                 event_date DATE NOT NULL \
                 CONSTRAINT valid_event_date \
                 CHECK (event_date BETWEEN DATE '{}' AND DATE '{}'), \
                 hour INT NOT NULL \
                 CONSTRAINT valid_hour CHECK (hour BETWEEN 0 AND 23), \
                 points BIGINT NOT NULL)",
                events, founding, cutoff
            ),
        ),
        Dialect::Sqlite => (
            format!(
                "CREATE TABLE {} (\
                 userid TEXT PRIMARY KEY NOT NULL \
                 CONSTRAINT valid_userid CHECK (length(userid) = 36), \
                 subscriber INTEGER NOT NULL \
                 CONSTRAINT valid_subscriber CHECK (subscriber IN (0, 1)), \
                 category TEXT NOT NULL \
                 CONSTRAINT valid_category CHECK (category IN ('A', 'B', 'C')))",
                users
            ),
            format!(
                "CREATE TABLE {} (\
                 userid TEXT NOT NULL \
                 CONSTRAINT valid_event_userid CHECK (length(userid) = 36), \
                 event_date TEXT NOT NULL \
                 CONSTRAINT valid_event_date \
                 CHECK (date(event_date) IS event_date AND event_date BETWEEN '{}' AND '{}'), \
                 hour INTEGER NOT NULL \
                 CONSTRAINT valid_hour CHECK (hour BETWEEN 0 AND 23), \
                 points INTEGER NOT NULL)",
                events, founding, cutoff
            ),
        ),
    };

    vec![
        format!("DROP TABLE IF EXISTS {}", events),
        format!("DROP TABLE IF EXISTS {}", users),
        users_table,
        events_table,
    ]
}

/// Canonical user read-back, ordered by user id.
pub fn select_canonical_users() -> String {
    format!(
        "SELECT userid, subscriber, category FROM {} ORDER BY userid",
        RecordKind::Users.canonical_table()
    )
}

/// Canonical event read-back in the deterministic export order.
pub fn select_canonical_events() -> String {
    format!(
        "SELECT userid, event_date, hour, points FROM {} \
         ORDER BY userid, event_date, hour, points",
        RecordKind::Events.canonical_table()
    )
}

/// Staged user read-back in source order.
pub fn select_staging_users() -> String {
    format!(
        "SELECT source_line, userid, subscriber, category FROM {} ORDER BY source_line",
        RecordKind::Users.staging_table()
    )
}

/// Staged event read-back in source order.
pub fn select_staging_events() -> String {
    format!(
        "SELECT source_line, userid, event_date, hour, points FROM {} ORDER BY source_line",
        RecordKind::Events.staging_table()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_staging_tables_are_unconstrained_text() {
        let ddl = staging_ddl();
        assert_eq!(ddl.len(), 4);
        assert!(ddl[2].contains("users_staging"));
        assert!(ddl[3].contains("event_performance_staging"));
        for statement in &ddl {
            assert!(!statement.contains("CHECK"));
            assert!(!statement.contains(';'));
        }
    }

    #[test]
    fn test_canonical_ddl_declares_constraints() {
        for dialect in [Dialect::Postgres, Dialect::Sqlite] {
            let ddl = canonical_ddl(dialect, &ValidityWindow::default()).join("\n");
            for constraint in [
                "valid_userid",
                "valid_subscriber",
                "valid_category",
                "valid_event_date",
                "valid_hour",
                "PRIMARY KEY",
            ] {
                assert!(ddl.contains(constraint), "{:?} missing {}", dialect, constraint);
            }
        }
    }

    #[test]
    fn test_window_rendered_into_ddl() {
        let window = ValidityWindow::new(
            NaiveDate::from_ymd_opt(2015, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
        )
        .unwrap();

        let pg = canonical_ddl(Dialect::Postgres, &window).join("\n");
        assert!(pg.contains("DATE '2015-03-01' AND DATE '2020-12-31'"));

        let lite = canonical_ddl(Dialect::Sqlite, &window).join("\n");
        assert!(lite.contains("BETWEEN '2015-03-01' AND '2020-12-31'"));
    }

    #[test]
    fn test_events_dropped_before_users() {
        let ddl = canonical_ddl(Dialect::Postgres, &ValidityWindow::default());
        assert_eq!(ddl[0], "DROP TABLE IF EXISTS event_performance");
        assert_eq!(ddl[1], "DROP TABLE IF EXISTS users");
    }
}
