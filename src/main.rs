use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use nl_query_backend::api;
use nl_query_backend::config::Config;
use nl_query_backend::services::{LlmService, OpenAiClient};
use nl_query_backend::storage::SqliteStorage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (also picks up .env)
    let config = Config::from_env()?;

    // Initialize logging; RUST_LOG has already been folded into logging.level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(config.logging.style != "never")
        .init();

    info!("Starting server on {}", config.server_address());

    // Initialize SQLite storage
    let storage = Arc::new(SqliteStorage::new(&config.database.url).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        e
    })?);

    let completion_client = OpenAiClient::new(&config)?;
    if config.llm.api_key.is_none() {
        tracing::warn!("No OPENAI_API_KEY configured; natural language queries will fail until one is set");
    }
    let llm = Arc::new(LlmService::new(Arc::new(completion_client), &config));

    // Create router with state
    let app: Router = api::routes::create_router_with_state(storage, llm);

    // Start server
    let addr: SocketAddr = config.server_address().parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
