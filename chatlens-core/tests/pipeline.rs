//! Integration tests for the chatlens answer pipeline
//!
//! These tests build throwaway SQLite logs in both physical layouts and
//! drive the public API end to end: open, ask, summary, status, reload.

use chatlens_core::config::LogSourceConfig;
use chatlens_core::generate::AnswerGenerator;
use chatlens_core::{AnswerSource, ChatLens, Config, Error, Message, Result, SchemaKind};
use chrono::Utc;
use rusqlite::Connection;
use std::path::PathBuf;
use tempfile::TempDir;

struct CannedGenerator {
    reply: String,
}

impl AnswerGenerator for CannedGenerator {
    fn generate(&self, _question: &str, _messages: &[Message]) -> Result<String> {
        Ok(self.reply.clone())
    }
}

fn event_payload(id: &str, text: &str, timestamp: i64, sender: &str, group: &str) -> String {
    format!(
        r#"{{"type":"message","timestamp":{},"source":{{"userId":"{}","groupId":"{}"}},"message":{{"id":"{}","type":"text","text":"{}"}}}}"#,
        timestamp, sender, group, id, text
    )
}

/// Event-layout log with six text messages, plus rows that must be dropped
/// during normalization: a follow event, a sticker, and a malformed payload.
fn build_event_log(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("events.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE events (id INTEGER PRIMARY KEY AUTOINCREMENT, event TEXT)")
        .unwrap();

    let payloads = [
        event_payload("m1", "おはよう", 1_000, "alice", "g1"),
        event_payload("m2", "ok, sounds good", 2_000, "bob", "g1"),
        event_payload("m3", "了解です", 3_000, "alice", "g1"),
        r#"{"type":"follow","timestamp":3500}"#.to_string(),
        event_payload("m4", "thanks!", 4_000, "carol", "g2"),
        r#"{"type":"message","timestamp":4500,"source":{"userId":"bob"},"message":{"id":"m5","type":"sticker"}}"#
            .to_string(),
        event_payload("m5", "お疲れ様", 5_000, "alice", "g1"),
        "{broken json".to_string(),
        event_payload("m6", "see you tomorrow", 6_000, "bob", "g1"),
    ];
    for payload in &payloads {
        conn.execute("INSERT INTO events (event) VALUES (?1)", [payload])
            .unwrap();
    }
    path
}

fn build_flat_log(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("chat.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE chat (timestamp INTEGER, user TEXT, message TEXT);
         CREATE TABLE users (id TEXT, name TEXT);
         INSERT INTO chat VALUES (1000, 'u1', 'morning all');
         INSERT INTO chat VALUES (2000, 'u2', 'ok');
         INSERT INTO chat VALUES (3000, 'u1', 'lunch?');
         INSERT INTO users VALUES ('u1', 'Alice');
         INSERT INTO users VALUES ('u2', 'Bob');",
    )
    .unwrap();
    path
}

fn config_for(path: PathBuf) -> Config {
    Config {
        log: LogSourceConfig { path: Some(path) },
        ..Default::default()
    }
}

// ============================================
// Event-log layout
// ============================================

#[test]
fn event_log_fallback_answers_who_question() {
    let dir = TempDir::new().unwrap();
    let lens = ChatLens::open_with_generator(&config_for(build_event_log(&dir)), None)
        .expect("open should succeed");

    let response = lens
        .ask("誰が一番話してる？", "recent")
        .expect("ask should succeed");

    // Six text messages survive; junk rows are dropped, not errors
    assert_eq!(response.message_count, 6);
    assert_eq!(response.source, AnswerSource::Fallback);
    assert_eq!(response.confidence, 0.70);
    // alice has 3 of the 6 messages
    assert!(response.answer.contains("alice"));
    assert!(response.answer.contains("3"));
    assert_eq!(response.context, "recent");
}

#[test]
fn event_log_generator_short_circuits_analysis() {
    let dir = TempDir::new().unwrap();
    let generator = Box::new(CannedGenerator {
        reply: "alice talks the most.".to_string(),
    });
    let lens =
        ChatLens::open_with_generator(&config_for(build_event_log(&dir)), Some(generator))
            .expect("open should succeed");

    let response = lens.ask("who talks most?", "all").expect("ask should succeed");

    assert_eq!(response.answer, "alice talks the most.");
    assert_eq!(response.source, AnswerSource::Generator);
    assert_eq!(response.confidence, 0.85);
    assert_eq!(response.context, "all");
}

#[test]
fn event_log_summary_and_status() {
    let dir = TempDir::new().unwrap();
    let lens = ChatLens::open_with_generator(&config_for(build_event_log(&dir)), None)
        .expect("open should succeed");

    let summary = lens.summary().expect("summary should succeed");
    assert_eq!(summary.total_events, 9);
    assert_eq!(summary.total_messages, 6);
    assert_eq!(summary.unique_participants, 3);
    assert_eq!(summary.unique_groups, 2);
    assert_eq!(summary.most_active_user.as_deref(), Some("alice"));
    // 5 seconds of traffic is still a single-day log
    assert_eq!(summary.average_messages_per_day, 6.0);

    let status = lens.status().expect("status should succeed");
    assert_eq!(status.schema, SchemaKind::EventLog);
    assert_eq!(status.message_table, "events");
    assert!(status.user_table.is_none());
    assert_eq!(status.total_rows, 9);
}

#[test]
fn monthly_mode_keeps_only_the_last_month() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE events (id INTEGER PRIMARY KEY AUTOINCREMENT, event TEXT)")
        .unwrap();

    let yesterday = Utc::now().timestamp_millis() - 86_400_000;
    let payloads = [
        event_payload("old", "ancient history", 1_000, "alice", "g1"),
        event_payload("new", "fresh news", yesterday, "bob", "g1"),
    ];
    for payload in &payloads {
        conn.execute("INSERT INTO events (event) VALUES (?1)", [payload])
            .unwrap();
    }
    drop(conn);

    let lens = ChatLens::open_with_generator(&config_for(path), None).expect("open should succeed");
    let response = lens.ask("anything new?", "monthly").expect("ask should succeed");

    assert_eq!(response.message_count, 1);
    assert_eq!(response.context, "monthly");
}

#[test]
fn empty_log_answers_with_no_data_report() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE events (id INTEGER PRIMARY KEY, event TEXT)")
        .unwrap();
    drop(conn);

    // Even with a generator configured, an empty window never reaches it
    let generator = Box::new(CannedGenerator {
        reply: "should not appear".to_string(),
    });
    let lens = ChatLens::open_with_generator(&config_for(path), Some(generator))
        .expect("open should succeed");

    let response = lens.ask("hello?", "recent").expect("ask should succeed");

    assert_eq!(response.message_count, 0);
    assert_eq!(response.source, AnswerSource::Fallback);
    assert!(response.answer.contains("No messages"));
}

#[test]
fn unknown_context_mode_is_rejected() {
    let dir = TempDir::new().unwrap();
    let lens = ChatLens::open_with_generator(&config_for(build_event_log(&dir)), None)
        .expect("open should succeed");

    let err = lens.ask("hi", "fortnightly").unwrap_err();
    match err {
        Error::InvalidContextMode(mode) => assert_eq!(mode, "fortnightly"),
        other => panic!("unexpected error: {other:?}"),
    }
}

// ============================================
// Flat-chat layout
// ============================================

#[test]
fn flat_chat_end_to_end() {
    let dir = TempDir::new().unwrap();
    let lens = ChatLens::open_with_generator(&config_for(build_flat_log(&dir)), None)
        .expect("open should succeed");

    let status = lens.status().expect("status should succeed");
    assert_eq!(status.schema, SchemaKind::FlatChat);
    assert_eq!(status.message_table, "chat");
    assert_eq!(status.user_table.as_deref(), Some("users"));
    assert_eq!(status.total_rows, 3);

    let response = lens
        .ask("give me an overview", "recent")
        .expect("ask should succeed");
    assert_eq!(response.message_count, 3);
    assert_eq!(response.source, AnswerSource::Fallback);
    assert!(response.answer.contains("Total messages: 3"));

    let summary = lens.summary().expect("summary should succeed");
    assert_eq!(summary.total_messages, 3);
    // The flat layout has no group column
    assert_eq!(summary.unique_groups, 0);
}

// ============================================
// Live file behavior
// ============================================

#[test]
fn appended_rows_are_visible_without_reload() {
    let dir = TempDir::new().unwrap();
    let path = build_flat_log(&dir);
    let lens = ChatLens::open_with_generator(&config_for(path.clone()), None)
        .expect("open should succeed");
    assert_eq!(lens.summary().unwrap().total_messages, 3);

    // A writer (the source bot) appends while we hold our read-only handle
    let writer = Connection::open(&path).unwrap();
    writer
        .execute_batch("INSERT INTO chat VALUES (4000, 'u2', 'one more')")
        .unwrap();
    drop(writer);

    assert_eq!(lens.summary().unwrap().total_messages, 4);
}

#[test]
fn reload_follows_a_replaced_file() {
    let dir = TempDir::new().unwrap();
    let path = build_event_log(&dir);
    let lens = ChatLens::open_with_generator(&config_for(path.clone()), None)
        .expect("open should succeed");
    assert_eq!(lens.status().unwrap().schema, SchemaKind::EventLog);

    std::fs::remove_file(&path).unwrap();
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE chat (timestamp INTEGER, user TEXT, message TEXT);
         INSERT INTO chat VALUES (1000, 'u1', 'fresh start');",
    )
    .unwrap();
    drop(conn);

    lens.reload().expect("reload should succeed");
    let status = lens.status().expect("status should succeed");
    assert_eq!(status.schema, SchemaKind::FlatChat);
    assert_eq!(status.total_rows, 1);
}
