pub mod api;
pub mod config;
pub mod error;
pub mod flow;
pub mod history;
pub mod llm;
pub mod prompts;
pub mod scraper;
pub mod session;

use std::sync::Arc;
use config::Config;
use flow::Orchestrator;
use session::SessionStore;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<SessionStore>,
}
