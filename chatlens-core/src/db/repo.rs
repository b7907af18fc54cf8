//! Chat log repository layer
//!
//! [`ChatLog`] owns the one read-only connection to the backing SQLite file
//! and exposes the uniform fetch primitives every other component goes
//! through. The connection is opened once at startup and only replaced by an
//! explicit [`ChatLog::reload`].
//!
//! Fetch results are [`RawRow`] values; turning them into messages is the
//! normalizer's job. Event-layout queries use coarse `LIKE` pre-filters on
//! the JSON payload (matching rows may still fail normalization), so row
//! counts here are upper bounds on message counts.

use crate::db::schema::{self, SchemaLayout};
use crate::error::Result;
use crate::types::{LogStatus, SchemaKind};
use rusqlite::{params, Connection, OpenFlags, Row};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// How [`ChatLog::fetch_all_rows`] orders its window, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrder {
    /// Physical arrival order (descending id)
    NewestById,
    /// Message-time order (descending embedded timestamp)
    NewestByTimestamp,
}

/// One raw row from the backing log, before normalization.
#[derive(Debug, Clone)]
pub enum RawRow {
    /// Event layout: an opaque JSON payload
    Event {
        /// Row id in the events table
        id: i64,
        /// JSON payload as stored
        payload: String,
    },
    /// Flat layout: already-split columns, all nullable at this point
    Flat {
        /// Storage rowid
        id: i64,
        /// Timestamp column cast to text
        timestamp: Option<String>,
        /// User column cast to text
        sender: Option<String>,
        /// Message column
        text: Option<String>,
    },
}

const EVENT_ROWS_BY_TIMESTAMP: &str = r#"
    SELECT id, event
    FROM events
    WHERE event LIKE '%"timestamp"%'
    ORDER BY CAST(json_extract(event, '$.timestamp') AS INTEGER) DESC
    LIMIT ?1
"#;

const EVENT_ROWS_BY_ID: &str = r#"
    SELECT id, event
    FROM events
    WHERE event LIKE '%"type"%'
    ORDER BY id DESC
    LIMIT ?1
"#;

const EVENT_ROWS_FOR_RANGE: &str = r#"
    SELECT id, event
    FROM events
    WHERE event LIKE '%"timestamp":%' AND event LIKE '%"type":"message"%'
    ORDER BY id
"#;

struct Inner {
    conn: Connection,
    layout: SchemaLayout,
}

impl Inner {
    fn open(path: &PathBuf) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        // The source bot may still be appending to this file
        conn.busy_timeout(Duration::from_secs(5))?;

        let layout = schema::detect(&conn)?;
        Ok(Self { conn, layout })
    }
}

/// Read-only handle to the backing chat log.
pub struct ChatLog {
    inner: Mutex<Inner>,
    path: PathBuf,
}

impl ChatLog {
    /// Open the log read-only and detect its physical layout.
    pub fn open(path: &PathBuf) -> Result<Self> {
        let inner = Inner::open(path)?;
        tracing::info!(
            path = %path.display(),
            schema = inner.layout.kind.as_str(),
            table = %inner.layout.message_table,
            "opened chat log"
        );
        Ok(Self {
            inner: Mutex::new(inner),
            path: path.clone(),
        })
    }

    /// Reopen the connection and re-run schema detection.
    ///
    /// On failure the existing connection stays in place and keeps serving
    /// reads.
    pub fn reload(&self) -> Result<()> {
        let fresh = Inner::open(&self.path)?;
        let mut inner = self.inner.lock().unwrap();
        tracing::info!(
            path = %self.path.display(),
            schema = fresh.layout.kind.as_str(),
            "reloaded chat log"
        );
        *inner = fresh;
        Ok(())
    }

    /// Path the log was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Currently detected layout.
    pub fn schema_kind(&self) -> SchemaKind {
        self.inner.lock().unwrap().layout.kind
    }

    /// Total rows in the message table, no filtering.
    pub fn count_rows(&self) -> Result<i64> {
        let inner = self.inner.lock().unwrap();
        count_message_rows(&inner)
    }

    /// Detection result plus row count, for operator-facing status output.
    pub fn status(&self) -> Result<LogStatus> {
        let inner = self.inner.lock().unwrap();
        let total_rows = count_message_rows(&inner)?;
        Ok(LogStatus {
            schema: inner.layout.kind,
            message_table: inner.layout.message_table.clone(),
            user_table: inner
                .layout
                .user_directory
                .as_ref()
                .map(|d| d.table.clone()),
            total_rows,
        })
    }

    /// Fetch up to `limit` rows, newest first under the requested order.
    pub fn fetch_all_rows(&self, limit: usize, order: RowOrder) -> Result<Vec<RawRow>> {
        let inner = self.inner.lock().unwrap();
        match inner.layout.kind {
            SchemaKind::EventLog => {
                let sql = match order {
                    RowOrder::NewestByTimestamp => EVENT_ROWS_BY_TIMESTAMP,
                    RowOrder::NewestById => EVENT_ROWS_BY_ID,
                };
                let mut stmt = inner.conn.prepare(sql)?;
                let rows = stmt.query_map(params![limit as i64], row_to_event)?;
                let rows = rows.collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            }
            SchemaKind::FlatChat => {
                let order_clause = match order {
                    RowOrder::NewestByTimestamp => "CAST(\"timestamp\" AS INTEGER) DESC",
                    RowOrder::NewestById => "rowid DESC",
                };
                let sql = format!(
                    "SELECT rowid, CAST(\"timestamp\" AS TEXT), CAST(\"user\" AS TEXT), \"message\"
                     FROM \"{}\"
                     ORDER BY {}
                     LIMIT ?1",
                    inner.layout.message_table, order_clause
                );
                let mut stmt = inner.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![limit as i64], row_to_flat)?;
                let rows = rows.collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            }
        }
    }

    /// Fetch candidate rows for a timestamp range, oldest first.
    ///
    /// The event layout can only pre-filter with coarse payload matches, so
    /// callers apply the authoritative range check after normalization. No
    /// row limit: cost is proportional to the log, which range callers
    /// accept.
    pub fn fetch_rows_in_range(&self, start_ms: i64, end_ms: i64) -> Result<Vec<RawRow>> {
        let inner = self.inner.lock().unwrap();
        match inner.layout.kind {
            SchemaKind::EventLog => {
                let mut stmt = inner.conn.prepare(EVENT_ROWS_FOR_RANGE)?;
                let rows = stmt.query_map([], row_to_event)?;
                let rows = rows.collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            }
            SchemaKind::FlatChat => {
                let sql = format!(
                    "SELECT rowid, CAST(\"timestamp\" AS TEXT), CAST(\"user\" AS TEXT), \"message\"
                     FROM \"{}\"
                     WHERE CAST(\"timestamp\" AS INTEGER) BETWEEN ?1 AND ?2
                     ORDER BY rowid",
                    inner.layout.message_table
                );
                let mut stmt = inner.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![start_ms, end_ms], row_to_flat)?;
                let rows = rows.collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            }
        }
    }

    /// Sender id to display name mapping; empty when the layout has none.
    pub fn fetch_user_directory(&self) -> Result<BTreeMap<String, String>> {
        let inner = self.inner.lock().unwrap();
        let directory = match inner.layout.user_directory.as_ref() {
            Some(directory) => directory,
            None => return Ok(BTreeMap::new()),
        };

        let sql = format!(
            "SELECT CAST(\"{}\" AS TEXT), \"{}\" FROM \"{}\"",
            directory.id_column, directory.name_column, directory.table
        );
        let mut stmt = inner.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<String>>(1)?,
            ))
        })?;

        let mut map = BTreeMap::new();
        for row in rows {
            if let (Some(id), Some(name)) = row? {
                map.insert(id, name);
            }
        }
        Ok(map)
    }
}

fn count_message_rows(inner: &Inner) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM \"{}\"", inner.layout.message_table);
    let count = inner.conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count)
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow::Event {
        id: row.get(0)?,
        payload: row.get(1)?,
    })
}

fn row_to_flat(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow::Flat {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        sender: row.get(2)?,
        text: row.get(3)?,
    })
}
