use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::error::{AppError, Result};

#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    /// Downloads `url` and returns the readable article text.
    async fn fetch(&self, url: &str) -> Result<String>;
}

// Create static selectors to avoid recompiling them each time
static ARTICLE_PARAGRAPHS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("article p").expect("Failed to parse article selector")
});

static MAIN_PARAGRAPHS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("main p").expect("Failed to parse main selector")
});

static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("p").expect("Failed to parse paragraph selector")
});

static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("body").expect("Failed to parse body selector")
});

pub struct HttpArticleFetcher {
    client: Client,
}

impl HttpArticleFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(10)
            .user_agent(user_agent)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArticleFetcher for HttpArticleFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::FetchError(format!("{} returned status {}", url, status)));
        }

        let html = response.text().await?;
        debug!(bytes = html.len(), "downloaded article HTML");

        let text = extract_text(&html);
        info!(url, chars = text.chars().count(), "extracted article text");
        Ok(text)
    }
}

/// Pulls the readable text out of an HTML page. Paragraphs inside `<article>`
/// win, then `<main>`, then every `<p>`, then the whole body.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector in [&*ARTICLE_PARAGRAPHS, &*MAIN_PARAGRAPHS, &*PARAGRAPHS] {
        let paragraphs: Vec<String> = document
            .select(selector)
            .map(element_text)
            .filter(|p| !p.is_empty())
            .collect();
        if !paragraphs.is_empty() {
            return paragraphs.join("\n\n");
        }
    }

    document
        .select(&BODY_SELECTOR)
        .next()
        .map(element_text)
        .unwrap_or_default()
}

fn element_text(element: ElementRef<'_>) -> String {
    let raw: String = element.text().collect();
    collapse_whitespace(&raw)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
