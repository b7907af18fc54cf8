//! Core domain types for chatlens
//!
//! These types form the canonical data model that normalizes chat activity
//! from both supported physical log layouts.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Message** | A normalized text message; the only unit downstream components consume |
//! | **SchemaKind** | Which physical log layout the backing SQLite file uses |
//! | **Statistics** | Aggregates derived from one Message set, recomputed per request |
//! | **AnswerSource** | Which path produced an answer (generator or fallback) |
//!
//! The two physical layouts exist only inside the `db` module; everything
//! else speaks [`Message`].

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================
// Schema
// ============================================

/// Physical log layouts this system can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    /// Append-only table holding one opaque JSON event payload per row
    EventLog,
    /// Table with pre-split timestamp/user/message columns
    FlatChat,
}

impl SchemaKind {
    /// Returns the identifier used in status output and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::EventLog => "event_log",
            SchemaKind::FlatChat => "flat_chat",
        }
    }
}

impl std::str::FromStr for SchemaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event_log" => Ok(SchemaKind::EventLog),
            "flat_chat" => Ok(SchemaKind::FlatChat),
            _ => Err(format!("unknown schema kind: {}", s)),
        }
    }
}

// ============================================
// Message
// ============================================

/// A normalized chat message.
///
/// Materialized fresh from the backing log on every request; rows that
/// cannot produce a valid Message are dropped during normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Identifier carried over from the source log (opaque, assumed unique there)
    pub id: String,
    /// Message text, never empty after normalization
    pub text: String,
    /// Epoch milliseconds; all ordering uses this
    pub timestamp: i64,
    /// Opaque author identifier
    pub sender_id: String,
    /// Group the message was posted in (event-log layout only)
    #[serde(default)]
    pub group_id: Option<String>,
    /// Display name resolved from the user directory, when one exists
    #[serde(default)]
    pub user_name: Option<String>,
}

impl Message {
    /// Name to show in reports and prompts; falls back to the sender id.
    pub fn display_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or(&self.sender_id)
    }

    /// Message time as UTC; `None` for timestamps outside chrono's range.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    /// Message time in the host's local timezone.
    pub fn sent_at_local(&self) -> Option<DateTime<Local>> {
        Local.timestamp_millis_opt(self.timestamp).single()
    }
}

// ============================================
// Statistics
// ============================================

/// First and last message times of a set; both `None` when the set is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    /// Earliest message time
    pub start: Option<DateTime<Utc>>,
    /// Latest message time
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Whole days covered, counting both endpoints. 1 when start and end
    /// fall on the same instant; `None` when the range is empty.
    pub fn day_span(&self) -> Option<i64> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => {
                Some((end - start).num_milliseconds() / 86_400_000 + 1)
            }
            _ => None,
        }
    }
}

/// Aggregate descriptors computed over one Message set.
///
/// Derived per request and never persisted. Tie-breaks are deterministic:
/// `most_active_user` resolves to the lexicographically smallest sender id
/// and `busiest_hour` to the earliest hour; equal-count keywords order
/// lexicographically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    /// Messages in the analyzed set
    pub total_messages: u64,
    /// Distinct sender ids
    pub unique_participants: u64,
    /// First and last message times
    pub date_range: DateRange,
    /// Sender with the highest message count
    pub most_active_user: Option<String>,
    /// Message count of that sender
    pub most_active_count: u64,
    /// Local hour of day (0-23) with the most traffic
    pub busiest_hour: Option<u8>,
    /// Message count in that hour
    pub busiest_hour_count: u64,
    /// Messages per day across the covered span, rounded to 2 decimals
    pub average_messages_per_day: f64,
    /// (word, count) pairs, count descending then word ascending
    pub top_keywords: Vec<(String, u64)>,
    /// Per-sender message counts
    pub messages_per_user: BTreeMap<String, u64>,
    /// Message counts by local hour of day
    pub hourly_activity: [u64; 24],
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            total_messages: 0,
            unique_participants: 0,
            date_range: DateRange::default(),
            most_active_user: None,
            most_active_count: 0,
            busiest_hour: None,
            busiest_hour_count: 0,
            average_messages_per_day: 0.0,
            top_keywords: Vec::new(),
            messages_per_user: BTreeMap::new(),
            hourly_activity: [0; 24],
        }
    }
}

// ============================================
// Answers
// ============================================

/// Which path produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    /// The external text-generation collaborator
    Generator,
    /// The deterministic statistics-based analyzer
    Fallback,
}

impl AnswerSource {
    /// Returns the identifier used in the caller-facing response
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerSource::Generator => "generator",
            AnswerSource::Fallback => "fallback",
        }
    }

    /// Fixed confidence reported for this path. These are contract
    /// constants, not computed values.
    pub fn confidence(&self) -> f64 {
        match self {
            AnswerSource::Generator => 0.85,
            AnswerSource::Fallback => 0.70,
        }
    }
}

/// Response handed to the caller for one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    /// Answer text from whichever path ran
    pub answer: String,
    /// Fixed per-path confidence (see [`AnswerSource::confidence`])
    pub confidence: f64,
    /// Which path produced the answer
    pub source: AnswerSource,
    /// Messages in the selected context
    pub message_count: usize,
    /// Name of the context mode that was used
    pub context: String,
}

// ============================================
// Operational views
// ============================================

/// Operator-facing overview of the backing log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSummary {
    /// Raw rows in the backing table, before any filtering
    pub total_events: i64,
    /// Messages surviving normalization within the sampled window
    pub total_messages: u64,
    /// Distinct senders seen
    pub unique_participants: u64,
    /// Distinct groups seen (always 0 for the flat layout)
    pub unique_groups: u64,
    /// First and last message times
    pub date_range: DateRange,
    /// Sender with the highest message count
    pub most_active_user: Option<String>,
    /// Messages per day across the covered span
    pub average_messages_per_day: f64,
}

/// Schema detection result plus a row count; no normalization performed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStatus {
    /// Detected physical layout
    pub schema: SchemaKind,
    /// Table rows are fetched from
    pub message_table: String,
    /// User-directory table, when the layout has one
    pub user_table: Option<String>,
    /// Total rows in the message table
    pub total_rows: i64,
}
