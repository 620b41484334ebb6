use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use econobot::{
    config::Config,
    api::routes::create_router,
    flow::Orchestrator,
    llm::OpenAiClient,
    scraper::HttpArticleFetcher,
    session::SessionStore,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration; a missing API key stops startup here
    let config = Config::load()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("econobot=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let server_addr = config.server_addr;
    info!(model = %config.model, "configuration loaded");

    let fetcher = HttpArticleFetcher::new(config.fetch_timeout, &config.fetch_user_agent)?;
    let completion = OpenAiClient::new(
        config.completion_url.clone(),
        config.openai_api_key.clone(),
        config.completion_timeout,
    )?;
    let orchestrator = Orchestrator::new(Arc::new(fetcher), Arc::new(completion), config.model.clone());

    // Create application state
    let app_state = AppState {
        config: Arc::new(config),
        orchestrator: Arc::new(orchestrator),
        sessions: Arc::new(SessionStore::new()),
    };

    // Build the router with routes
    let app = create_router(app_state);

    // Create the listener
    let listener = TcpListener::bind(server_addr).await?;

    // Start the server
    info!(%server_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
