//! Statistics over normalized message sets
//!
//! One [`compute`] call walks the message slice exactly once and derives
//! every aggregate from that traversal. Results are a pure function of the
//! input: same messages, same lexicon, same statistics.
//!
//! Tie-breaks are deterministic by contract. The most active user resolves
//! to the lexicographically smallest sender id and the busiest hour to the
//! earliest hour; equal-count keywords order lexicographically.

use crate::types::{DateRange, Message, Statistics};
use chrono::{TimeZone, Timelike, Utc};
use std::collections::BTreeMap;

/// Compute aggregates over one message set.
///
/// `keywords` is the fixed lexicon to count. A keyword is counted at most
/// once per containing message, matched case-insensitively as a substring.
/// `top_n` caps the keyword list length.
///
/// The day-span divisor counts both endpoint days, so a set confined to a
/// single day divides by one and the average equals the total.
pub fn compute(messages: &[Message], keywords: &[String], top_n: usize) -> Statistics {
    if messages.is_empty() {
        return Statistics::default();
    }

    let lexicon: Vec<(String, &str)> = keywords
        .iter()
        .map(|word| (word.to_lowercase(), word.as_str()))
        .collect();

    let mut per_user: BTreeMap<String, u64> = BTreeMap::new();
    let mut keyword_counts: BTreeMap<&str, u64> = BTreeMap::new();
    let mut hourly = [0u64; 24];
    let mut min_ts = i64::MAX;
    let mut max_ts = i64::MIN;

    for message in messages {
        *per_user.entry(message.sender_id.clone()).or_insert(0) += 1;

        min_ts = min_ts.min(message.timestamp);
        max_ts = max_ts.max(message.timestamp);

        if let Some(local) = message.sent_at_local() {
            hourly[local.hour() as usize] += 1;
        }

        let text = message.text.to_lowercase();
        for (lowered, display) in &lexicon {
            if text.contains(lowered.as_str()) {
                *keyword_counts.entry(display).or_insert(0) += 1;
            }
        }
    }

    let (most_active_user, most_active_count) = pick_most_active(&per_user);
    let (busiest_hour, busiest_hour_count) = pick_busiest_hour(&hourly);

    let date_range = DateRange {
        start: Utc.timestamp_millis_opt(min_ts).single(),
        end: Utc.timestamp_millis_opt(max_ts).single(),
    };
    let total = messages.len() as u64;
    let average_messages_per_day = match date_range.day_span() {
        Some(days) if days > 0 => round2(total as f64 / days as f64),
        _ => 0.0,
    };

    let mut top_keywords: Vec<(String, u64)> = keyword_counts
        .into_iter()
        .map(|(word, count)| (word.to_string(), count))
        .collect();
    top_keywords.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_keywords.truncate(top_n);

    Statistics {
        total_messages: total,
        unique_participants: per_user.len() as u64,
        date_range,
        most_active_user,
        most_active_count,
        busiest_hour,
        busiest_hour_count,
        average_messages_per_day,
        top_keywords,
        messages_per_user: per_user,
        hourly_activity: hourly,
    }
}

/// Highest-count sender; ascending map order makes the smallest id win ties.
fn pick_most_active(per_user: &BTreeMap<String, u64>) -> (Option<String>, u64) {
    let mut best: Option<(&String, u64)> = None;
    for (user, count) in per_user {
        match best {
            Some((_, best_count)) if *count <= best_count => {}
            _ => best = Some((user, *count)),
        }
    }
    match best {
        Some((user, count)) => (Some(user.clone()), count),
        None => (None, 0),
    }
}

/// Highest-count hour; the scan order makes the earliest hour win ties.
fn pick_busiest_hour(hourly: &[u64; 24]) -> (Option<u8>, u64) {
    let mut best: Option<(u8, u64)> = None;
    for (hour, count) in hourly.iter().enumerate() {
        match best {
            Some((_, best_count)) if *count <= best_count => {}
            _ if *count > 0 => best = Some((hour as u8, *count)),
            _ => {}
        }
    }
    match best {
        Some((hour, count)) => (Some(hour), count),
        None => (None, 0),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
