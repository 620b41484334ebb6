use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::session::Sentiment;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// One chat completion call, serialized as the request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the generated text of the first choice.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Client for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build completion client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        debug!(model = %request.model, max_tokens = request.max_tokens, "calling completion API");

        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::CompletionError(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "completion API returned an error");
            return Err(AppError::CompletionError(format!("{}: {}", status, body)));
        }

        let json: serde_json::Value = res
            .json()
            .await
            .map_err(|e| AppError::CompletionError(e.to_string()))?;
        let reply = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AppError::CompletionError("Invalid response format from completion API".to_string()))?
            .trim()
            .to_string();

        Ok(reply)
    }
}

pub const MAX_TOPICS: usize = 2;

/// Structured fields pulled out of an article by the metadata prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleMetadata {
    pub topics: Vec<String>,
    pub sentiment: Sentiment,
    pub impact_score: Option<i64>,
}

impl ArticleMetadata {
    /// Used when the model's reply could not be turned into metadata.
    pub fn fallback() -> Self {
        Self {
            topics: Vec::new(),
            sentiment: Sentiment::Unknown,
            impact_score: None,
        }
    }
}

#[derive(Deserialize)]
struct RawMetadata {
    // null and missing both mean "no topics"
    #[serde(default)]
    topics: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    sentiment: Option<String>,
    #[serde(default)]
    impact_score: Option<serde_json::Value>,
}

/// Parses the metadata reply. Missing keys take their fallback values; a reply
/// that is not a JSON object is a `MetadataParseError`.
pub fn parse_metadata(reply: &str) -> Result<ArticleMetadata> {
    let json = extract_json(reply)
        .ok_or_else(|| AppError::MetadataParseError("no JSON object in reply".to_string()))?;
    let raw: RawMetadata =
        serde_json::from_str(json).map_err(|e| AppError::MetadataParseError(e.to_string()))?;

    let topics = raw
        .topics
        .unwrap_or_default()
        .iter()
        .filter_map(|t| t.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .take(MAX_TOPICS)
        .map(String::from)
        .collect();

    Ok(ArticleMetadata {
        topics,
        sentiment: raw
            .sentiment
            .as_deref()
            .map(Sentiment::from_label)
            .unwrap_or(Sentiment::Unknown),
        impact_score: raw.impact_score.as_ref().and_then(score_from_value),
    })
}

fn score_from_value(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Finds the first complete JSON object in a reply that may be wrapped in a
/// code fence or surrounded by prose. Braces inside string literals are not
/// counted.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
