use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    response::{IntoResponse, Response},
    http::StatusCode,
};
use uuid::Uuid;

use crate::api::response;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to fetch article: {0}")]
    FetchError(String),

    #[error("Article too short or blocked ({length} characters, need at least {minimum}). Try a different source.")]
    ContentTooShort { length: usize, minimum: usize },

    #[error("Completion API error: {0}")]
    CompletionError(String),

    #[error("Could not parse article metadata: {0}")]
    MetadataParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Session {0} not found")]
    SessionNotFound(Uuid),

    #[error("{0}")]
    NotReady(String),

    #[error("Request processing timed out")]
    Timeout,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::FetchError(_) => StatusCode::BAD_REQUEST,
            AppError::ContentTooShort { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::CompletionError(_) => StatusCode::BAD_GATEWAY,
            AppError::MetadataParseError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotReady(_) => StatusCode::CONFLICT,
            AppError::Timeout => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        response::error::<()>(status, self.to_string()).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::FetchError(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
