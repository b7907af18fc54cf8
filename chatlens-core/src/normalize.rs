//! Raw row normalization
//!
//! Converts [`RawRow`] values from either physical layout into canonical
//! [`Message`] records.
//!
//! # Error Handling
//!
//! The normalizer is resilient by contract: a malformed row is dropped and
//! counted, never raised. A single bad payload must not abort a batch.
//!
//! - **Malformed JSON payloads**: dropped, logged at debug.
//! - **Non-text events** (stickers, joins, follows): dropped; these are
//!   routine in event logs, not anomalies.
//! - **Missing required fields / bad timestamps**: dropped with the field
//!   named in the drop reason.
//!
//! Drop counts are part of [`NormalizedBatch`], so callers can observe the
//! processed-versus-emitted ratio.

use crate::db::RawRow;
use crate::types::Message;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// Why a raw row produced no Message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Payload was not valid JSON
    PayloadSyntax,
    /// Event is not a text message (wrong event kind or message kind)
    NotTextMessage,
    /// A required field is absent
    MissingField(&'static str),
    /// Timestamp present but not a non-negative integer
    BadTimestamp,
    /// Text field present but empty
    EmptyText,
}

impl DropReason {
    /// Short identifier for log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::PayloadSyntax => "payload_syntax",
            DropReason::NotTextMessage => "not_text_message",
            DropReason::MissingField(_) => "missing_field",
            DropReason::BadTimestamp => "bad_timestamp",
            DropReason::EmptyText => "empty_text",
        }
    }
}

/// Output of one normalization pass.
///
/// Participants and groups are collected in the same traversal that builds
/// the message list; there is no second pass.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    /// Messages that survived normalization, in input order
    pub messages: Vec<Message>,
    /// Distinct sender ids seen
    pub participants: BTreeSet<String>,
    /// Distinct group ids seen (event layout only)
    pub groups: BTreeSet<String>,
    /// Raw rows examined
    pub rows_processed: usize,
    /// Rows that produced no Message
    pub rows_dropped: usize,
}

// ============================================
// Raw event payload types (serde deserialization)
// ============================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawEventPayload {
    #[serde(rename = "type")]
    event_type: Option<String>,
    timestamp: Option<serde_json::Value>,
    source: Option<RawEventSource>,
    message: Option<RawEventMessage>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawEventSource {
    #[serde(rename = "userId")]
    user_id: Option<String>,
    #[serde(rename = "groupId")]
    group_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawEventMessage {
    id: Option<serde_json::Value>,
    #[serde(rename = "type")]
    message_type: Option<String>,
    text: Option<String>,
}

// ============================================
// Row normalization
// ============================================

/// Normalize one raw row, or explain why it was dropped.
pub fn normalize_row(row: &RawRow) -> Result<Message, DropReason> {
    match row {
        RawRow::Event { payload, .. } => normalize_event(payload),
        RawRow::Flat {
            id,
            timestamp,
            sender,
            text,
        } => normalize_flat(*id, timestamp.as_deref(), sender.as_deref(), text.as_deref()),
    }
}

fn normalize_event(payload: &str) -> Result<Message, DropReason> {
    let event: RawEventPayload =
        serde_json::from_str(payload).map_err(|_| DropReason::PayloadSyntax)?;

    if event.event_type.as_deref() != Some("message") {
        return Err(DropReason::NotTextMessage);
    }
    let message = event.message.ok_or(DropReason::NotTextMessage)?;
    if message.message_type.as_deref() != Some("text") {
        return Err(DropReason::NotTextMessage);
    }

    let timestamp = match event.timestamp {
        None => return Err(DropReason::MissingField("timestamp")),
        Some(value) => value.as_i64().ok_or(DropReason::BadTimestamp)?,
    };
    if timestamp < 0 {
        return Err(DropReason::BadTimestamp);
    }

    let source = event
        .source
        .ok_or(DropReason::MissingField("source.userId"))?;
    let sender_id = source
        .user_id
        .ok_or(DropReason::MissingField("source.userId"))?;
    let group_id = source.group_id;

    let text = message.text.ok_or(DropReason::MissingField("message.text"))?;
    if text.is_empty() {
        return Err(DropReason::EmptyText);
    }

    let id = match message.id {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(_) | None => return Err(DropReason::MissingField("message.id")),
    };

    Ok(Message {
        id,
        text,
        timestamp,
        sender_id,
        group_id,
        user_name: None,
    })
}

fn normalize_flat(
    row_id: i64,
    timestamp: Option<&str>,
    sender: Option<&str>,
    text: Option<&str>,
) -> Result<Message, DropReason> {
    let timestamp = timestamp.ok_or(DropReason::MissingField("timestamp"))?;
    let timestamp: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| DropReason::BadTimestamp)?;
    if timestamp < 0 {
        return Err(DropReason::BadTimestamp);
    }

    let sender_id = sender.ok_or(DropReason::MissingField("user"))?;
    let text = text.ok_or(DropReason::MissingField("message"))?;
    if text.is_empty() {
        return Err(DropReason::EmptyText);
    }

    Ok(Message {
        id: row_id.to_string(),
        text: text.to_string(),
        timestamp,
        sender_id: sender_id.to_string(),
        group_id: None,
        user_name: None,
    })
}

/// Normalize a batch in a single pass.
///
/// Never fails: rows that cannot produce a Message are counted and logged,
/// and the output message count is at most the input row count.
pub fn normalize_all(rows: &[RawRow]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for row in rows {
        batch.rows_processed += 1;
        match normalize_row(row) {
            Ok(message) => {
                batch.participants.insert(message.sender_id.clone());
                if let Some(group_id) = &message.group_id {
                    batch.groups.insert(group_id.clone());
                }
                batch.messages.push(message);
            }
            Err(reason) => {
                batch.rows_dropped += 1;
                tracing::debug!(
                    row = row_id(row),
                    reason = reason.as_str(),
                    "dropped raw row"
                );
            }
        }
    }

    if batch.rows_dropped > 0 {
        tracing::info!(
            processed = batch.rows_processed,
            emitted = batch.messages.len(),
            dropped = batch.rows_dropped,
            "normalization dropped rows"
        );
    }

    batch
}

/// Attach display names from the user directory.
///
/// Decoration only: sender identity and grouping are untouched, and senders
/// absent from the directory keep their id as the display name.
pub fn apply_user_directory(messages: &mut [Message], directory: &BTreeMap<String, String>) {
    if directory.is_empty() {
        return;
    }
    for message in messages {
        if let Some(name) = directory.get(&message.sender_id) {
            message.user_name = Some(name.clone());
        }
    }
}

fn row_id(row: &RawRow) -> i64 {
    match row {
        RawRow::Event { id, .. } => *id,
        RawRow::Flat { id, .. } => *id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_row(id: i64, payload: &str) -> RawRow {
        RawRow::Event {
            id,
            payload: payload.to_string(),
        }
    }

    fn text_event(id: &str, text: &str, timestamp: i64, sender: &str) -> String {
        format!(
            r#"{{"type":"message","timestamp":{},"source":{{"userId":"{}","groupId":"g1"}},"message":{{"id":"{}","type":"text","text":"{}"}}}}"#,
            timestamp, sender, id, text
        )
    }

    #[test]
    fn normalizes_text_event() {
        let row = event_row(1, &text_event("m1", "hello", 1_700_000_000_000, "alice"));
        let message = normalize_row(&row).expect("should normalize");

        assert_eq!(message.id, "m1");
        assert_eq!(message.text, "hello");
        assert_eq!(message.timestamp, 1_700_000_000_000);
        assert_eq!(message.sender_id, "alice");
        assert_eq!(message.group_id.as_deref(), Some("g1"));
        assert!(message.user_name.is_none());
    }

    #[test]
    fn drops_malformed_json() {
        let row = event_row(1, "{not json");
        assert_eq!(normalize_row(&row), Err(DropReason::PayloadSyntax));
    }

    #[test]
    fn drops_non_message_events() {
        let row = event_row(1, r#"{"type":"follow","timestamp":1000}"#);
        assert_eq!(normalize_row(&row), Err(DropReason::NotTextMessage));
    }

    #[test]
    fn drops_non_text_messages() {
        let payload = r#"{"type":"message","timestamp":1000,"source":{"userId":"u"},"message":{"id":"m","type":"sticker"}}"#;
        assert_eq!(
            normalize_row(&event_row(1, payload)),
            Err(DropReason::NotTextMessage)
        );
    }

    #[test]
    fn drops_missing_and_bad_timestamps() {
        let payload = r#"{"type":"message","source":{"userId":"u"},"message":{"id":"m","type":"text","text":"hi"}}"#;
        assert_eq!(
            normalize_row(&event_row(1, payload)),
            Err(DropReason::MissingField("timestamp"))
        );

        let payload = r#"{"type":"message","timestamp":"soon","source":{"userId":"u"},"message":{"id":"m","type":"text","text":"hi"}}"#;
        assert_eq!(
            normalize_row(&event_row(1, payload)),
            Err(DropReason::BadTimestamp)
        );

        let payload = r#"{"type":"message","timestamp":-5,"source":{"userId":"u"},"message":{"id":"m","type":"text","text":"hi"}}"#;
        assert_eq!(
            normalize_row(&event_row(1, payload)),
            Err(DropReason::BadTimestamp)
        );
    }

    #[test]
    fn drops_empty_text() {
        let payload = r#"{"type":"message","timestamp":1000,"source":{"userId":"u"},"message":{"id":"m","type":"text","text":""}}"#;
        assert_eq!(
            normalize_row(&event_row(1, payload)),
            Err(DropReason::EmptyText)
        );
    }

    #[test]
    fn numeric_message_id_is_coerced() {
        let payload = r#"{"type":"message","timestamp":1000,"source":{"userId":"u"},"message":{"id":42,"type":"text","text":"hi"}}"#;
        let message = normalize_row(&event_row(1, payload)).unwrap();
        assert_eq!(message.id, "42");
    }

    #[test]
    fn normalizes_flat_row() {
        let row = RawRow::Flat {
            id: 7,
            timestamp: Some("1000".to_string()),
            sender: Some("u1".to_string()),
            text: Some("hello".to_string()),
        };
        let message = normalize_row(&row).unwrap();

        assert_eq!(message.id, "7");
        assert_eq!(message.timestamp, 1000);
        assert_eq!(message.sender_id, "u1");
        assert!(message.group_id.is_none());
    }

    #[test]
    fn flat_row_requires_numeric_timestamp() {
        let row = RawRow::Flat {
            id: 1,
            timestamp: Some("yesterday".to_string()),
            sender: Some("u1".to_string()),
            text: Some("hello".to_string()),
        };
        assert_eq!(normalize_row(&row), Err(DropReason::BadTimestamp));

        let row = RawRow::Flat {
            id: 1,
            timestamp: None,
            sender: Some("u1".to_string()),
            text: Some("hello".to_string()),
        };
        assert_eq!(normalize_row(&row), Err(DropReason::MissingField("timestamp")));
    }

    #[test]
    fn flat_row_requires_text() {
        let row = RawRow::Flat {
            id: 1,
            timestamp: Some("1000".to_string()),
            sender: Some("u1".to_string()),
            text: None,
        };
        assert_eq!(normalize_row(&row), Err(DropReason::MissingField("message")));
    }

    #[test]
    fn batch_never_aborts_and_collects_sets() {
        let rows = vec![
            event_row(1, &text_event("m1", "hello", 1_000, "alice")),
            event_row(2, "{broken"),
            event_row(3, &text_event("m2", "world", 2_000, "bob")),
            event_row(4, r#"{"type":"join","timestamp":3000}"#),
        ];

        let batch = normalize_all(&rows);

        assert_eq!(batch.rows_processed, 4);
        assert_eq!(batch.messages.len(), 2);
        assert_eq!(batch.rows_dropped, 2);
        assert!(batch.messages.len() <= rows.len());
        assert_eq!(
            batch.participants.iter().cloned().collect::<Vec<_>>(),
            vec!["alice".to_string(), "bob".to_string()]
        );
        assert_eq!(batch.groups.len(), 1);
    }

    #[test]
    fn user_directory_decorates_without_touching_identity() {
        let rows = vec![event_row(1, &text_event("m1", "hi", 1_000, "u1"))];
        let mut batch = normalize_all(&rows);

        let mut directory = BTreeMap::new();
        directory.insert("u1".to_string(), "Alice".to_string());
        directory.insert("u2".to_string(), "Bob".to_string());
        apply_user_directory(&mut batch.messages, &directory);

        assert_eq!(batch.messages[0].sender_id, "u1");
        assert_eq!(batch.messages[0].user_name.as_deref(), Some("Alice"));
        assert_eq!(batch.messages[0].display_name(), "Alice");
    }
}
