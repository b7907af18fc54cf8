//! Physical schema detection
//!
//! Inspects the SQLite catalog once per connection open and classifies the
//! log into one of the supported layouts:
//!
//! - **Event log**: an `events` table whose `event` column holds one JSON
//!   payload per row.
//! - **Flat chat**: any table carrying `timestamp`, `user` and `message`
//!   columns, optionally accompanied by a user-directory table mapping
//!   sender ids to display names.
//!
//! A log matching neither shape is rejected with
//! [`Error::SchemaUnsupported`] before any row is read.

use crate::error::{Error, Result};
use crate::types::SchemaKind;
use rusqlite::Connection;

/// Candidate id columns for the user-directory table, in match order.
const USER_ID_COLUMNS: &[&str] = &["id", "user_id"];

/// Candidate display-name columns for the user-directory table, in match order.
const USER_NAME_COLUMNS: &[&str] = &["name", "display_name"];

/// Optional `sender id -> display name` lookup table (flat layout only).
#[derive(Debug, Clone)]
pub struct UserDirectory {
    /// Table holding the mapping
    pub table: String,
    /// Column holding the sender id
    pub id_column: String,
    /// Column holding the display name
    pub name_column: String,
}

/// Detected layout plus the concrete table names behind it.
#[derive(Debug, Clone)]
pub struct SchemaLayout {
    /// Which layout matched
    pub kind: SchemaKind,
    /// Table rows are fetched from
    pub message_table: String,
    /// User directory, when the layout has one
    pub user_directory: Option<UserDirectory>,
}

/// Classify the log's physical layout.
///
/// The event layout is checked first, so a file carrying both an `events`
/// table and a flat chat table reads as an event log.
pub fn detect(conn: &Connection) -> Result<SchemaLayout> {
    let tables = table_names(conn)?;

    if tables.iter().any(|t| t == "events") {
        let columns = table_columns(conn, "events")?;
        if columns.iter().any(|c| c == "event") {
            return Ok(SchemaLayout {
                kind: SchemaKind::EventLog,
                message_table: "events".to_string(),
                user_directory: None,
            });
        }
    }

    for table in &tables {
        let columns = table_columns(conn, table)?;
        let has = |name: &str| columns.iter().any(|c| c == name);
        if has("timestamp") && has("user") && has("message") {
            return Ok(SchemaLayout {
                kind: SchemaKind::FlatChat,
                message_table: table.clone(),
                user_directory: find_user_directory(conn, &tables, table)?,
            });
        }
    }

    Err(Error::SchemaUnsupported(format!(
        "no supported message table among: [{}]",
        tables.join(", ")
    )))
}

/// User tables are matched by shape: one id column plus one name column.
fn find_user_directory(
    conn: &Connection,
    tables: &[String],
    message_table: &str,
) -> Result<Option<UserDirectory>> {
    for table in tables {
        if table == message_table {
            continue;
        }
        let columns = table_columns(conn, table)?;
        let find = |candidates: &[&str]| {
            candidates
                .iter()
                .find(|c| columns.iter().any(|col| col == *c))
                .map(|c| c.to_string())
        };
        if let (Some(id_column), Some(name_column)) =
            (find(USER_ID_COLUMNS), find(USER_NAME_COLUMNS))
        {
            return Ok(Some(UserDirectory {
                table: table.clone(),
                id_column,
                name_column,
            }));
        }
    }
    Ok(None)
}

/// Tables in the catalog, name order, internal tables excluded.
fn table_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let names = rows.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Column names of a table, in declaration order.
fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let columns = rows.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_event_log() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE events (id INTEGER PRIMARY KEY, event TEXT)")
            .unwrap();

        let layout = detect(&conn).expect("detection should succeed");
        assert_eq!(layout.kind, SchemaKind::EventLog);
        assert_eq!(layout.message_table, "events");
        assert!(layout.user_directory.is_none());
    }

    #[test]
    fn detects_flat_chat_with_user_directory() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE chat_log (timestamp TEXT, user TEXT, message TEXT);
             CREATE TABLE members (user_id TEXT, display_name TEXT);",
        )
        .unwrap();

        let layout = detect(&conn).expect("detection should succeed");
        assert_eq!(layout.kind, SchemaKind::FlatChat);
        assert_eq!(layout.message_table, "chat_log");

        let directory = layout.user_directory.expect("directory should be found");
        assert_eq!(directory.table, "members");
        assert_eq!(directory.id_column, "user_id");
        assert_eq!(directory.name_column, "display_name");
    }

    #[test]
    fn detects_flat_chat_without_user_directory() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE chat (timestamp INTEGER, user TEXT, message TEXT)")
            .unwrap();

        let layout = detect(&conn).expect("detection should succeed");
        assert_eq!(layout.kind, SchemaKind::FlatChat);
        assert!(layout.user_directory.is_none());
    }

    #[test]
    fn event_table_wins_over_flat_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE events (id INTEGER PRIMARY KEY, event TEXT);
             CREATE TABLE chat (timestamp TEXT, user TEXT, message TEXT);",
        )
        .unwrap();

        let layout = detect(&conn).expect("detection should succeed");
        assert_eq!(layout.kind, SchemaKind::EventLog);
    }

    #[test]
    fn rejects_unrecognized_layout() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE notes (body TEXT)").unwrap();

        let err = detect(&conn).expect_err("detection should fail");
        assert!(matches!(err, Error::SchemaUnsupported(_)));
    }

    #[test]
    fn rejects_empty_database() {
        let conn = Connection::open_in_memory().unwrap();
        let err = detect(&conn).expect_err("detection should fail");
        assert!(matches!(err, Error::SchemaUnsupported(_)));
    }
}
