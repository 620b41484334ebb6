use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::history::{Dashboard, RecentEntry};
use crate::prompts::Language;

#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

#[derive(Deserialize)]
pub struct SetUrlRequest {
    pub url: String,
}

#[derive(Deserialize)]
pub struct TranslateRequest {
    #[serde(default)]
    pub language: Language,
}

#[derive(Serialize)]
pub struct TranslateResponse {
    pub language: Language,
    pub translation: Option<String>,
}

#[derive(Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

#[derive(Serialize)]
pub struct AnswerResponse {
    pub question: String,
    pub answer: String,
}

/// Everything the page needs to render one session.
#[derive(Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub article_url: Option<String>,
    pub summary: Option<String>,
    pub has_content: bool,
    pub dashboard: Dashboard,
    pub recent: Vec<RecentEntry>,
}
