//! The summarize pipeline and the translate / question sub-flows.
//!
//! `summarize` takes the session state by value and always hands it back. If
//! anything fails before the history append, the returned state is the one
//! that came in.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::history;
use crate::llm::{parse_metadata, ArticleMetadata, CompletionClient, CompletionRequest, Message};
use crate::prompts::{self, Language, Task};
use crate::scraper::ArticleFetcher;
use crate::session::{HistoryEntry, SessionState};

/// Articles shorter than this are treated as blocked or truncated.
pub const MIN_CONTENT_CHARS: usize = 300;
pub const ARTICLE_PREVIEW_CHARS: usize = 700;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Fetching,
    Fetched,
    Summarizing,
    MetadataExtracting,
    Recorded,
    Error,
}

/// A failure tagged with the stage it happened in.
type StageResult<T> = std::result::Result<T, (Stage, AppError)>;

/// What a successful summarize run produced.
#[derive(Debug, Clone, Serialize)]
pub struct Summarized {
    pub url: String,
    pub summary: String,
    pub article_preview: String,
    pub word_count: usize,
    pub metadata: ArticleMetadata,
    pub metadata_fallback: bool,
    pub history_len: usize,
}

pub struct Orchestrator {
    fetcher: Arc<dyn ArticleFetcher>,
    completion: Arc<dyn CompletionClient>,
    model: String,
}

impl Orchestrator {
    pub fn new(
        fetcher: Arc<dyn ArticleFetcher>,
        completion: Arc<dyn CompletionClient>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            completion,
            model: model.into(),
        }
    }

    pub async fn summarize(&self, state: SessionState) -> (SessionState, Result<Summarized>) {
        match self.run_summary(&state).await {
            Ok((entry, content, outcome)) => {
                let mut next = state;
                next.content = Some(content);
                next.summary = Some(entry.summary.clone());
                next.record(entry);
                let outcome = Summarized {
                    history_len: next.history().len(),
                    ..outcome
                };
                transition(Stage::Recorded, Stage::Idle);
                (next, Ok(outcome))
            }
            Err((stage, err)) => {
                transition(stage, Stage::Error);
                warn!(?stage, error = %err, "summarize failed, session left unchanged");
                (state, Err(err))
            }
        }
    }

    async fn run_summary(&self, state: &SessionState) -> StageResult<(HistoryEntry, String, Summarized)> {
        let url = state
            .article_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| (Stage::Idle, AppError::InvalidRequest("enter an article URL first".to_string())))?;

        transition(Stage::Idle, Stage::Fetching);
        info!(url = %url, "fetching article");
        let content = self
            .fetcher
            .fetch(&url)
            .await
            .map_err(|e| (Stage::Fetching, e))?;
        let content = content.trim().to_string();
        let length = content.chars().count();
        if length < MIN_CONTENT_CHARS {
            return Err((
                Stage::Fetching,
                AppError::ContentTooShort {
                    length,
                    minimum: MIN_CONTENT_CHARS,
                },
            ));
        }
        transition(Stage::Fetching, Stage::Fetched);

        transition(Stage::Fetched, Stage::Summarizing);
        let summary = self
            .ask(Task::Summary, prompts::summary_prompt(&content))
            .await
            .map_err(|e| (Stage::Summarizing, e))?;

        transition(Stage::Summarizing, Stage::MetadataExtracting);
        let (metadata, metadata_fallback) = match self.extract_metadata(&content).await {
            Ok(metadata) => (metadata, false),
            Err(err) => {
                transition(Stage::MetadataExtracting, Stage::Error);
                warn!(error = %err, "metadata extraction failed, recording with defaults");
                (ArticleMetadata::fallback(), true)
            }
        };
        let from = if metadata_fallback { Stage::Error } else { Stage::MetadataExtracting };
        transition(from, Stage::Recorded);

        let entry = HistoryEntry {
            url: url.clone(),
            summary: summary.clone(),
            topics: metadata.topics.clone(),
            sentiment: metadata.sentiment,
            impact_score: metadata.impact_score,
            recorded_at: Utc::now(),
        };
        let outcome = Summarized {
            url,
            summary,
            article_preview: format!(
                "{}{}",
                content.chars().take(ARTICLE_PREVIEW_CHARS).collect::<String>(),
                history::CONTINUATION
            ),
            word_count: content.split_whitespace().count(),
            metadata,
            metadata_fallback,
            history_len: 0,
        };
        Ok((entry, content, outcome))
    }

    /// Second, independent pass over the same article text.
    pub async fn extract_metadata(&self, content: &str) -> Result<ArticleMetadata> {
        let reply = self.ask(Task::Metadata, prompts::metadata_prompt(content)).await?;
        parse_metadata(&reply)
    }

    /// Translates the current summary. `Language::None` is a no-op.
    pub async fn translate(&self, state: &SessionState, language: Language) -> Result<Option<String>> {
        if language == Language::None {
            return Ok(None);
        }
        let summary = state
            .summary
            .as_deref()
            .ok_or_else(|| AppError::NotReady("summarize an article before translating".to_string()))?;

        info!(language = language.name(), "translating summary");
        let translation = self
            .ask(Task::Translation, prompts::translation_prompt(summary, language))
            .await?;
        Ok(Some(translation))
    }

    pub async fn answer_question(&self, state: &SessionState, question: &str) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::InvalidRequest("question must not be empty".to_string()));
        }
        let content = state
            .content
            .as_deref()
            .ok_or_else(|| AppError::NotReady("summarize an article before asking about it".to_string()))?;

        info!("answering question about current article");
        self.ask(Task::Question, prompts::question_prompt(content, question))
            .await
    }

    async fn ask(&self, task: Task, prompt: String) -> Result<String> {
        self.completion
            .complete(CompletionRequest {
                model: self.model.clone(),
                messages: vec![Message::user(prompt)],
                temperature: task.temperature(),
                max_tokens: task.max_tokens(),
            })
            .await
    }
}

fn transition(from: Stage, to: Stage) {
    debug!(?from, ?to, "summarize stage");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Sentiment;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct FakeFetcher {
        reply: Result<String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn ok(text: String) -> Arc<Self> {
            Arc::new(Self { reply: Ok(text), calls: Mutex::new(vec![]) })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(AppError::FetchError("blocked".to_string())),
                calls: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl ArticleFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.calls.lock().unwrap().push(url.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(err) => Err(AppError::FetchError(err.to_string())),
            }
        }
    }

    /// Replies from a queue; an exhausted queue fails the call.
    #[derive(Default)]
    struct ScriptedCompletion {
        replies: Mutex<VecDeque<Result<String>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedCompletion {
        fn with(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::default(),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletion {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::CompletionError("no scripted reply".to_string())))
        }
    }

    fn article() -> String {
        "Central banks held rates steady while inflation cooled. ".repeat(10)
    }

    const METADATA: &str = r#"{"topics": ["Rates", "Inflation"], "sentiment": "Positive", "impact_score": 7}"#;

    fn session_with_url(url: &str) -> SessionState {
        let mut state = SessionState::new();
        state.set_article_url(url);
        state
    }

    fn orchestrator(fetcher: Arc<FakeFetcher>, completion: Arc<ScriptedCompletion>) -> Orchestrator {
        Orchestrator::new(fetcher, completion, "test-model")
    }

    #[tokio::test]
    async fn successful_run_records_one_entry() {
        let completion = ScriptedCompletion::with(vec![Ok("A summary.".to_string()), Ok(METADATA.to_string())]);
        let flow = orchestrator(FakeFetcher::ok(article()), completion.clone());

        let (state, outcome) = flow.summarize(session_with_url("https://news.example/a")).await;
        let outcome = outcome.unwrap();

        assert_eq!(outcome.history_len, 1);
        assert!(!outcome.metadata_fallback);
        assert_eq!(state.summary.as_deref(), Some("A summary."));
        assert_eq!(state.content.as_deref(), Some(article().trim()));
        let entry = &state.history()[0];
        assert_eq!(entry.url, "https://news.example/a");
        assert_eq!(entry.topics, ["Rates", "Inflation"]);
        assert_eq!(entry.sentiment, Sentiment::Positive);
        assert_eq!(entry.impact_score, Some(7));
        assert_eq!(completion.calls(), 2);
    }

    #[tokio::test]
    async fn both_calls_use_the_article_content() {
        let completion = ScriptedCompletion::with(vec![Ok("Summary text".to_string()), Ok(METADATA.to_string())]);
        let flow = orchestrator(FakeFetcher::ok(article()), completion.clone());
        let _ = flow.summarize(session_with_url("https://news.example/a")).await;

        let requests = completion.requests.lock().unwrap();
        assert_eq!(requests[0].max_tokens, Task::Summary.max_tokens());
        assert_eq!(requests[1].max_tokens, Task::Metadata.max_tokens());
        assert_eq!(requests[0].model, "test-model");
        let needle = "Central banks held rates steady";
        assert!(requests[0].messages[0].content.contains(needle));
        assert!(requests[1].messages[0].content.contains(needle));
        assert!(!requests[1].messages[0].content.contains("Summary text"));
    }

    #[tokio::test]
    async fn each_run_appends_in_call_order() {
        let completion = ScriptedCompletion::with(vec![
            Ok("first".to_string()),
            Ok(METADATA.to_string()),
            Ok("second".to_string()),
            Ok(METADATA.to_string()),
            Ok("third".to_string()),
            Ok(METADATA.to_string()),
        ]);
        let flow = orchestrator(FakeFetcher::ok(article()), completion);

        let mut state = session_with_url("https://news.example/same");
        for expected in 1..=3 {
            let (next, outcome) = flow.summarize(state).await;
            assert_eq!(outcome.unwrap().history_len, expected);
            state = next;
        }
        let summaries: Vec<&str> = state.history().iter().map(|e| e.summary.as_str()).collect();
        assert_eq!(summaries, ["first", "second", "third"]);
        assert!(state.history().iter().all(|e| e.url == "https://news.example/same"));
    }

    #[tokio::test]
    async fn short_content_makes_no_completion_call() {
        let completion = ScriptedCompletion::with(vec![]);
        let flow = orchestrator(FakeFetcher::ok("Access denied.".to_string()), completion.clone());
        let before = session_with_url("https://news.example/blocked");

        let (after, outcome) = flow.summarize(before.clone()).await;

        assert!(matches!(outcome, Err(AppError::ContentTooShort { length: 14, minimum: MIN_CONTENT_CHARS })));
        assert_eq!(after, before);
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn content_length_fencepost_is_three_hundred_chars() {
        let completion = ScriptedCompletion::with(vec![]);
        let flow = orchestrator(FakeFetcher::ok("a".repeat(MIN_CONTENT_CHARS - 1)), completion.clone());
        let (_, outcome) = flow.summarize(session_with_url("https://news.example/299")).await;
        assert!(matches!(outcome, Err(AppError::ContentTooShort { length: 299, .. })));
        assert_eq!(completion.calls(), 0);

        let completion = ScriptedCompletion::with(vec![Ok("s".to_string()), Ok(METADATA.to_string())]);
        let flow = orchestrator(FakeFetcher::ok("a".repeat(MIN_CONTENT_CHARS)), completion.clone());
        let (state, outcome) = flow.summarize(session_with_url("https://news.example/300")).await;
        assert!(outcome.is_ok());
        assert_eq!(state.history().len(), 1);
        assert_eq!(completion.calls(), 2);
    }

    #[tokio::test]
    async fn failures_report_the_stage_they_happened_in() {
        let flow = orchestrator(FakeFetcher::ok(article()), ScriptedCompletion::with(vec![]));
        let failed = flow.run_summary(&SessionState::new()).await.unwrap_err();
        assert_eq!(failed.0, Stage::Idle);

        let flow = orchestrator(FakeFetcher::failing(), ScriptedCompletion::with(vec![]));
        let failed = flow.run_summary(&session_with_url("https://news.example/a")).await.unwrap_err();
        assert_eq!(failed.0, Stage::Fetching);
        assert!(matches!(failed.1, AppError::FetchError(_)));

        let flow = orchestrator(FakeFetcher::ok("short".to_string()), ScriptedCompletion::with(vec![]));
        let failed = flow.run_summary(&session_with_url("https://news.example/a")).await.unwrap_err();
        assert_eq!(failed.0, Stage::Fetching);
        assert!(matches!(failed.1, AppError::ContentTooShort { .. }));

        let completion = ScriptedCompletion::with(vec![Err(AppError::CompletionError("quota".to_string()))]);
        let flow = orchestrator(FakeFetcher::ok(article()), completion);
        let failed = flow.run_summary(&session_with_url("https://news.example/a")).await.unwrap_err();
        assert_eq!(failed.0, Stage::Summarizing);
        assert!(matches!(failed.1, AppError::CompletionError(_)));
    }

    #[tokio::test]
    async fn failed_fetch_leaves_previous_state() {
        let good = ScriptedCompletion::with(vec![Ok("kept".to_string()), Ok(METADATA.to_string())]);
        let (before, outcome) = orchestrator(FakeFetcher::ok(article()), good)
            .summarize(session_with_url("https://news.example/a"))
            .await;
        outcome.unwrap();

        let mut before = before;
        before.set_article_url("https://news.example/b");
        let completion = ScriptedCompletion::with(vec![]);
        let flow = orchestrator(FakeFetcher::failing(), completion.clone());
        let (after, outcome) = flow.summarize(before.clone()).await;

        assert!(matches!(outcome, Err(AppError::FetchError(_))));
        assert_eq!(after, before);
        assert_eq!(after.summary.as_deref(), Some("kept"));
        assert_eq!(after.history().len(), 1);
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn summary_failure_records_nothing() {
        let completion = ScriptedCompletion::with(vec![Err(AppError::CompletionError("quota".to_string()))]);
        let flow = orchestrator(FakeFetcher::ok(article()), completion);
        let before = session_with_url("https://news.example/a");

        let (after, outcome) = flow.summarize(before.clone()).await;

        assert!(matches!(outcome, Err(AppError::CompletionError(_))));
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn malformed_metadata_falls_back_and_still_records() {
        let completion = ScriptedCompletion::with(vec![
            Ok("A summary.".to_string()),
            Ok("Sorry, I cannot produce JSON.".to_string()),
        ]);
        let flow = orchestrator(FakeFetcher::ok(article()), completion);

        let (state, outcome) = flow.summarize(session_with_url("https://news.example/a")).await;
        let outcome = outcome.unwrap();

        assert!(outcome.metadata_fallback);
        assert_eq!(outcome.metadata, ArticleMetadata::fallback());
        let entry = &state.history()[0];
        assert!(entry.topics.is_empty());
        assert_eq!(entry.sentiment, Sentiment::Unknown);
        assert_eq!(entry.impact_score, None);
        assert_eq!(entry.summary, "A summary.");
    }

    #[tokio::test]
    async fn metadata_call_failure_also_falls_back() {
        let completion = ScriptedCompletion::with(vec![Ok("A summary.".to_string())]);
        let flow = orchestrator(FakeFetcher::ok(article()), completion);

        let (state, outcome) = flow.summarize(session_with_url("https://news.example/a")).await;

        assert!(outcome.unwrap().metadata_fallback);
        assert_eq!(state.history().len(), 1);
    }

    #[tokio::test]
    async fn summarize_without_url_is_rejected() {
        let completion = ScriptedCompletion::with(vec![]);
        let fetcher = FakeFetcher::ok(article());
        let flow = orchestrator(fetcher.clone(), completion);

        let (_, outcome) = flow.summarize(SessionState::new()).await;

        assert!(matches!(outcome, Err(AppError::InvalidRequest(_))));
        assert!(fetcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn preview_and_word_count_come_from_content() {
        let completion = ScriptedCompletion::with(vec![Ok("s".to_string()), Ok(METADATA.to_string())]);
        let flow = orchestrator(FakeFetcher::ok(article()), completion);

        let (_, outcome) = flow.summarize(session_with_url("https://news.example/a")).await;
        let outcome = outcome.unwrap();

        assert_eq!(outcome.word_count, 80);
        assert!(outcome.article_preview.ends_with("..."));
        assert_eq!(
            outcome.article_preview.chars().count(),
            ARTICLE_PREVIEW_CHARS.min(article().trim().chars().count()) + 3
        );
    }

    #[tokio::test]
    async fn translate_none_makes_no_call() {
        let completion = ScriptedCompletion::with(vec![]);
        let flow = orchestrator(FakeFetcher::ok(article()), completion.clone());
        let mut state = SessionState::new();
        state.summary = Some("A summary.".to_string());

        let result = flow.translate(&state, Language::None).await.unwrap();

        assert_eq!(result, None);
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn translate_uses_current_summary() {
        let completion = ScriptedCompletion::with(vec![Ok("Un résumé.".to_string())]);
        let flow = orchestrator(FakeFetcher::ok(article()), completion.clone());
        let mut state = SessionState::new();
        state.summary = Some("A summary.".to_string());

        let result = flow.translate(&state, Language::French).await.unwrap();

        assert_eq!(result.as_deref(), Some("Un résumé."));
        let requests = completion.requests.lock().unwrap();
        assert_eq!(requests[0].messages[0].content, "Translate this into French:\n\nA summary.");
        assert!(state.history().is_empty());
    }

    #[tokio::test]
    async fn translate_without_summary_is_not_ready() {
        let flow = orchestrator(FakeFetcher::ok(article()), ScriptedCompletion::with(vec![]));
        let err = flow.translate(&SessionState::new(), Language::Spanish).await.unwrap_err();
        assert!(matches!(err, AppError::NotReady(_)));
    }

    #[tokio::test]
    async fn question_uses_content_and_low_temperature() {
        let completion = ScriptedCompletion::with(vec![Ok("Because demand fell.".to_string())]);
        let flow = orchestrator(FakeFetcher::ok(article()), completion.clone());
        let mut state = SessionState::new();
        state.content = Some(article());

        let answer = flow.answer_question(&state, "  Why?  ").await.unwrap();

        assert_eq!(answer, "Because demand fell.");
        let requests = completion.requests.lock().unwrap();
        assert_eq!(requests[0].max_tokens, 300);
        assert!(requests[0].messages[0].content.ends_with("Question:\nWhy?"));
    }

    #[tokio::test]
    async fn question_requires_content_and_text() {
        let completion = ScriptedCompletion::with(vec![]);
        let flow = orchestrator(FakeFetcher::ok(article()), completion.clone());

        let err = flow.answer_question(&SessionState::new(), "Why?").await.unwrap_err();
        assert!(matches!(err, AppError::NotReady(_)));

        let mut state = SessionState::new();
        state.content = Some(article());
        let err = flow.answer_question(&state, "   ").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert_eq!(completion.calls(), 0);
    }
}
