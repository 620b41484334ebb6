//! Dashboard statistics and the recent-history preview.
//!
//! Everything is recomputed from the full history on each render; nothing here
//! is cached between requests.

use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;

use crate::session::{HistoryEntry, Sentiment};

pub const RECENT_LIMIT: usize = 5;
pub const PREVIEW_CHARS: usize = 500;
pub const TOP_TOPICS: usize = 3;
pub const CONTINUATION: &str = "...";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicCount {
    pub topic: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub count: usize,
    pub avg_impact_score: Option<f64>,
    pub modal_sentiment: Option<Sentiment>,
    pub top_topics: Vec<TopicCount>,
}

impl Dashboard {
    pub fn from_history(history: &[HistoryEntry]) -> Self {
        Self {
            count: history.len(),
            avg_impact_score: average_impact(history),
            modal_sentiment: most_common(history.iter().map(|e| e.sentiment))
                .into_iter()
                .next()
                .map(|(sentiment, _)| sentiment),
            top_topics: most_common(history.iter().flat_map(|e| e.topics.iter().cloned()))
                .into_iter()
                .take(TOP_TOPICS)
                .map(|(topic, count)| TopicCount { topic, count })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentEntry {
    /// 1-based position in the full history.
    pub number: usize,
    pub url: String,
    pub preview: String,
}

/// The last `limit` entries, most recent first, with truncated summaries.
pub fn recent(history: &[HistoryEntry], limit: usize, preview_chars: usize) -> Vec<RecentEntry> {
    history
        .iter()
        .enumerate()
        .rev()
        .take(limit)
        .map(|(i, entry)| RecentEntry {
            number: i + 1,
            url: entry.url.clone(),
            preview: truncate(&entry.summary, preview_chars),
        })
        .collect()
}

/// Truncates to `max_chars` characters, appending the continuation marker
/// when anything was cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], CONTINUATION),
        None => text.to_string(),
    }
}

fn average_impact(history: &[HistoryEntry]) -> Option<f64> {
    // Scores are not range-checked, so sum in f64 to stay clear of overflow
    let scores: Vec<f64> = history
        .iter()
        .filter_map(|e| e.impact_score)
        .map(|s| s as f64)
        .collect();
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}

/// Counts values and orders them by descending count. Equal counts keep the
/// order in which each value was first seen.
fn most_common<T, I>(values: I) -> Vec<(T, usize)>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut slots: HashMap<T, usize> = HashMap::new();
    let mut counts: Vec<(T, usize)> = Vec::new();
    for value in values {
        match slots.get(&value) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                slots.insert(value.clone(), counts.len());
                counts.push((value, 1));
            }
        }
    }
    // sort_by is stable, so first-seen order survives among ties
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
