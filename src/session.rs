//! Per-session state and the registry that owns it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
    Unknown,
}

impl Sentiment {
    /// Case-insensitive label match. Anything unrecognised is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "neutral" => Sentiment::Neutral,
            "negative" => Sentiment::Negative,
            _ => Sentiment::Unknown,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Sentiment::Positive => "Positive",
            Sentiment::Neutral => "Neutral",
            Sentiment::Negative => "Negative",
            Sentiment::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// One recorded summarization. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub url: String,
    pub summary: String,
    pub topics: Vec<String>,
    pub sentiment: Sentiment,
    pub impact_score: Option<i64>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub article_url: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    history: Vec<HistoryEntry>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the URL the user entered. Blank input keeps the previous URL.
    pub fn set_article_url(&mut self, url: &str) {
        let url = url.trim();
        if !url.is_empty() {
            self.article_url = Some(url.to_string());
        }
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    // history is append-only: no other mutator exists
    pub(crate) fn record(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }
}

pub type SharedSession = Arc<Mutex<SessionState>>;

/// All live sessions, keyed by id. Each session has its own lock so that one
/// session's actions run one at a time without blocking the others.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(SessionState::new())));
        id
    }

    pub async fn get(&self, id: Uuid) -> Result<SharedSession> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(AppError::SessionNotFound(id))
    }

    pub async fn remove(&self, id: Uuid) -> Result<()> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(AppError::SessionNotFound(id))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
