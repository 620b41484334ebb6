use axum::{
    routing::{get, post, put},
    Router,
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse},
};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, AppError};
use crate::api::extract::{ApiJson, ApiPath};
use crate::api::models::{
    AnswerResponse, CreateSessionResponse, QuestionRequest, SessionView, SetUrlRequest,
    TranslateRequest, TranslateResponse,
};
use crate::api::response;
use crate::history::{self, Dashboard};
use crate::prompts::Language;
use crate::AppState;

pub const SUMMARY_FILENAME: &str = "econobot_summary.txt";

const INDEX_HTML: &str = include_str!("../../static/index.html");

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/languages", get(languages_handler))
        .route("/api/sessions", post(create_session_handler))
        .route("/api/sessions/:id", get(session_handler).delete(end_session_handler))
        .route("/api/sessions/:id/url", put(set_url_handler))
        .route("/api/sessions/:id/summarize", post(summarize_handler))
        .route("/api/sessions/:id/translate", post(translate_handler))
        .route("/api/sessions/:id/question", post(question_handler))
        .route("/api/sessions/:id/dashboard", get(dashboard_handler))
        .route("/api/sessions/:id/summary.txt", get(download_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn languages_handler() -> impl IntoResponse {
    response::success(Language::ALL)
}

async fn create_session_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session_id = state.sessions.create().await;
    let active = state.sessions.len().await;
    info!(%session_id, active, "session created");
    response::with_status(StatusCode::CREATED, CreateSessionResponse { session_id })
}

async fn end_session_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse> {
    state.sessions.remove(id).await?;
    info!(session_id = %id, "session ended");
    Ok(StatusCode::NO_CONTENT)
}

async fn session_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse> {
    let session = state.sessions.get(id).await?;
    let session = session.lock().await;
    let entries = session.history();

    Ok(response::success(SessionView {
        session_id: id,
        article_url: session.article_url.clone(),
        summary: session.summary.clone(),
        has_content: session.content.is_some(),
        dashboard: Dashboard::from_history(entries),
        recent: history::recent(entries, history::RECENT_LIMIT, history::PREVIEW_CHARS),
    }))
}

async fn dashboard_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse> {
    let session = state.sessions.get(id).await?;
    let session = session.lock().await;
    Ok(response::success(Dashboard::from_history(session.history())))
}

async fn set_url_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<SetUrlRequest>,
) -> Result<impl IntoResponse> {
    if req.url.trim().is_empty() {
        return Err(AppError::InvalidRequest("url must not be empty".to_string()));
    }
    let session = state.sessions.get(id).await?;
    let mut session = session.lock().await;
    session.set_article_url(&req.url);
    Ok(response::success(session.article_url.clone()))
}

async fn summarize_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse> {
    let session = state.sessions.get(id).await?;
    // Held for the whole run so one session's actions never interleave
    let mut session = session.lock().await;
    info!(session_id = %id, url = ?session.article_url, "processing summarize request");
    let start_time = std::time::Instant::now();

    // The flow gets a copy; on timeout the stored state is simply kept
    let result = tokio::time::timeout(
        state.config.request_timeout,
        state.orchestrator.summarize((*session).clone()),
    )
    .await;

    let elapsed = start_time.elapsed();
    info!(session_id = %id, ?elapsed, "summarize request finished");

    match result {
        Ok((next, outcome)) => {
            *session = next;
            Ok(response::success(outcome?))
        }
        Err(_) => Err(AppError::Timeout),
    }
}

async fn translate_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<TranslateRequest>,
) -> Result<impl IntoResponse> {
    let session = state.sessions.get(id).await?;
    let session = session.lock().await;
    let translation = state.orchestrator.translate(&session, req.language).await?;
    Ok(response::success(TranslateResponse {
        language: req.language,
        translation,
    }))
}

async fn question_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<QuestionRequest>,
) -> Result<impl IntoResponse> {
    let session = state.sessions.get(id).await?;
    let session = session.lock().await;
    let answer = state.orchestrator.answer_question(&session, &req.question).await?;
    Ok(response::success(AnswerResponse {
        question: req.question,
        answer,
    }))
}

async fn download_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse> {
    let session = state.sessions.get(id).await?;
    let summary = session
        .lock()
        .await
        .summary
        .clone()
        .ok_or_else(|| AppError::NotReady("no summary to download yet".to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", SUMMARY_FILENAME),
            ),
        ],
        summary,
    ))
}
