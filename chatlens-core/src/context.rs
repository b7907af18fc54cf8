//! Context selection
//!
//! Maps a caller-supplied context mode onto a fetch-and-normalize pipeline
//! and returns the message window the downstream stages operate on.
//!
//! Each mode has its own ordering contract:
//!
//! - `recent` fetches the newest rows by storage id, then re-sorts the
//!   survivors chronologically (oldest first).
//! - `all` fetches the newest rows by timestamp and keeps that order, so
//!   the window reads newest first.
//! - date ranges fetch broadly, filter on the normalized timestamp, and
//!   sort chronologically. The range check here is authoritative; the SQL
//!   layer only pre-filters.

use crate::config::ContextConfig;
use crate::db::{ChatLog, RowOrder};
use crate::error::{Error, Result};
use crate::normalize::{apply_user_directory, normalize_all};
use crate::types::Message;
use chrono::{DateTime, Months, Utc};

/// A resolved context mode, ready to run against a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    /// Latest `limit` rows by insertion order, presented chronologically
    Recent { limit: usize },
    /// Inclusive timestamp window in epoch milliseconds, presented chronologically
    DateRange { start_ms: i64, end_ms: i64 },
    /// Latest `limit` rows by timestamp, presented newest first
    All { limit: usize },
}

/// Messages selected for one question, with normalization counters.
#[derive(Debug, Default)]
pub struct ContextWindow {
    /// Messages in the mode's documented order
    pub messages: Vec<Message>,
    /// Raw rows examined to build the window
    pub rows_processed: usize,
    /// Rows dropped during normalization
    pub rows_dropped: usize,
}

/// Resolve a mode name into a [`ContextMode`].
///
/// `monthly` spans the previous calendar month through `now`. Unknown
/// names are an error, not a silent default.
pub fn parse(mode: &str, now: DateTime<Utc>, config: &ContextConfig) -> Result<ContextMode> {
    match mode {
        "recent" => Ok(ContextMode::Recent {
            limit: config.recent_limit,
        }),
        "all" => Ok(ContextMode::All {
            limit: config.all_limit,
        }),
        "monthly" => {
            let start = now.checked_sub_months(Months::new(1)).unwrap_or(now);
            Ok(ContextMode::DateRange {
                start_ms: start.timestamp_millis(),
                end_ms: now.timestamp_millis(),
            })
        }
        other => Err(Error::InvalidContextMode(other.to_string())),
    }
}

/// Run a context mode against a log.
///
/// Selected messages are decorated with display names when the log carries
/// a user directory. An empty selection is a valid window, not an error.
pub fn select(log: &ChatLog, mode: &ContextMode) -> Result<ContextWindow> {
    let rows = match mode {
        ContextMode::Recent { limit } => log.fetch_all_rows(*limit, RowOrder::NewestById)?,
        ContextMode::All { limit } => log.fetch_all_rows(*limit, RowOrder::NewestByTimestamp)?,
        ContextMode::DateRange { start_ms, end_ms } => {
            log.fetch_rows_in_range(*start_ms, *end_ms)?
        }
    };

    let batch = normalize_all(&rows);
    let mut messages = batch.messages;

    match mode {
        ContextMode::Recent { .. } => {
            // Stable sort keeps fetch order for equal timestamps
            messages.sort_by_key(|m| m.timestamp);
        }
        ContextMode::All { .. } => {
            // Fetch order is already newest-first by timestamp
        }
        ContextMode::DateRange { start_ms, end_ms } => {
            messages.retain(|m| m.timestamp >= *start_ms && m.timestamp <= *end_ms);
            messages.sort_by_key(|m| m.timestamp);
        }
    }

    let directory = log.fetch_user_directory()?;
    apply_user_directory(&mut messages, &directory);

    tracing::debug!(
        mode = ?mode,
        selected = messages.len(),
        processed = batch.rows_processed,
        dropped = batch.rows_dropped,
        "selected context window"
    );

    Ok(ContextWindow {
        messages,
        rows_processed: batch.rows_processed,
        rows_dropped: batch.rows_dropped,
    })
}
