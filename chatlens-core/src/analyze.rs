//! Fallback question analyzer
//!
//! Deterministic answer path used when the external generator is absent or
//! fails. Classifies the question into a fixed intent by keyword matching,
//! computes statistics over the context window, and renders a templated
//! report for that intent.
//!
//! Classification is an ordered list of (intent, keywords) rules evaluated
//! top to bottom; the first rule with any match wins and everything else
//! falls through to the general report. This path has no external
//! dependencies and its output is fully predictable.

use crate::stats;
use crate::types::{Message, Statistics};

/// Analysis intents the fallback path can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionIntent {
    /// Keyword and topic frequency
    Topic,
    /// Participant activity
    User,
    /// Activity by hour of day
    Time,
    /// Abbreviated overview of everything
    General,
}

impl QuestionIntent {
    /// Short identifier for log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionIntent::Topic => "topic",
            QuestionIntent::User => "user",
            QuestionIntent::Time => "time",
            QuestionIntent::General => "general",
        }
    }
}

/// Ordered classification rules; first match wins.
///
/// User rules run before topic rules: questions asking who talks the most
/// tend to contain talk words too, and they must classify as user.
const INTENT_RULES: &[(QuestionIntent, &[&str])] = &[
    (
        QuestionIntent::User,
        &["アクティブ", "活発", "誰", "だれ", "active", "who"],
    ),
    (
        QuestionIntent::Topic,
        &["話題", "話", "キーワード", "topic", "talk", "keyword"],
    ),
    (
        QuestionIntent::Time,
        &["時間", "いつ", "when", "hour", "time"],
    ),
];

/// Classify a free-text question into an analysis intent.
pub fn classify(question: &str) -> QuestionIntent {
    let lowered = question.to_lowercase();
    for (intent, words) in INTENT_RULES {
        if words.iter().any(|word| lowered.contains(word)) {
            return *intent;
        }
    }
    QuestionIntent::General
}

/// Answer a question from statistics alone.
///
/// Never fails and never calls the generator. An empty window renders an
/// explicit no-data report rather than an empty string.
pub fn analyze(question: &str, messages: &[Message], keywords: &[String], top_n: usize) -> String {
    if messages.is_empty() {
        return render_no_data();
    }

    let intent = classify(question);
    let statistics = stats::compute(messages, keywords, top_n);

    tracing::debug!(
        intent = intent.as_str(),
        messages = messages.len(),
        "rendering fallback analysis"
    );

    match intent {
        QuestionIntent::Topic => render_topic(&statistics),
        QuestionIntent::User => render_user(&statistics),
        QuestionIntent::Time => render_time(&statistics),
        QuestionIntent::General => render_general(&statistics),
    }
}

// ============================================
// Report templates
// ============================================

fn render_no_data() -> String {
    "No messages were found in the selected context, so there is nothing to analyze.".to_string()
}

fn render_topic(statistics: &Statistics) -> String {
    let mut report = String::from("Topic analysis for this chat:\n\n");

    if !statistics.top_keywords.is_empty() {
        report.push_str("Most used keywords:\n");
        for (rank, (word, count)) in statistics.top_keywords.iter().take(5).enumerate() {
            report.push_str(&format!("{}. \"{}\" ({} times)\n", rank + 1, word, count));
        }
        report.push('\n');
    }

    report.push_str("Overall:\n");
    report.push_str(&format!("- Total messages: {}\n", statistics.total_messages));
    report.push_str(&format!(
        "- Participants: {}\n",
        statistics.unique_participants
    ));

    report
}

fn render_user(statistics: &Statistics) -> String {
    let mut report = String::from("User activity analysis for this chat:\n\n");

    if let Some(user) = &statistics.most_active_user {
        report.push_str("Most active user:\n");
        report.push_str(&format!("- Sender: {}\n", user));
        report.push_str(&format!("- Messages: {}\n\n", statistics.most_active_count));
    }

    report.push_str("Overall:\n");
    report.push_str(&format!("- Total messages: {}\n", statistics.total_messages));
    report.push_str(&format!(
        "- Participants: {}\n",
        statistics.unique_participants
    ));
    report.push_str(&format!(
        "- Average messages per participant: {}\n",
        per_participant_average(statistics)
    ));

    report
}

fn render_time(statistics: &Statistics) -> String {
    let mut report = String::from("Activity by hour for this chat:\n\n");

    if let Some(hour) = statistics.busiest_hour {
        report.push_str("Busiest hour:\n");
        report.push_str(&format!("- Hour: {:02}:00\n", hour));
        report.push_str(&format!(
            "- Messages: {}\n\n",
            statistics.busiest_hour_count
        ));
    }

    if let (Some(start), Some(end)) = (statistics.date_range.start, statistics.date_range.end) {
        report.push_str("Covered period:\n");
        report.push_str(&format!("- From: {}\n", start.format("%Y-%m-%d")));
        report.push_str(&format!("- To: {}\n", end.format("%Y-%m-%d")));
    }

    report
}

fn render_general(statistics: &Statistics) -> String {
    let mut report = String::from("Summary of this chat:\n\n");

    report.push_str(&format!("- Total messages: {}\n", statistics.total_messages));
    report.push_str(&format!(
        "- Participants: {}\n",
        statistics.unique_participants
    ));
    report.push_str(&format!(
        "- Average messages per participant: {}\n",
        per_participant_average(statistics)
    ));

    if let Some(user) = &statistics.most_active_user {
        report.push_str(&format!(
            "- Most active user: {} ({} messages)\n",
            user, statistics.most_active_count
        ));
    }
    if let Some(hour) = statistics.busiest_hour {
        report.push_str(&format!(
            "- Busiest hour: {:02}:00 ({} messages)\n",
            hour, statistics.busiest_hour_count
        ));
    }

    if !statistics.top_keywords.is_empty() {
        report.push_str("\nFrequent keywords:\n");
        for (rank, (word, count)) in statistics.top_keywords.iter().take(3).enumerate() {
            report.push_str(&format!("{}. \"{}\" ({} times)\n", rank + 1, word, count));
        }
    }

    report
}

fn per_participant_average(statistics: &Statistics) -> u64 {
    if statistics.unique_participants == 0 {
        return 0;
    }
    (statistics.total_messages as f64 / statistics.unique_participants as f64).round() as u64
}
