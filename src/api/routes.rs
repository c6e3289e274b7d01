use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{connection, query, AppState};
use crate::services::LlmService;
use crate::storage::SqliteStorage;

/// Create router with application state
pub fn create_router_with_state(storage: Arc<SqliteStorage>, llm: Arc<LlmService>) -> Router {
    let state = AppState { storage, llm };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/connections/test", post(connection::test_connection))
        .route(
            "/api/connections",
            get(connection::list_connections).post(connection::create_connection),
        )
        .route(
            "/api/connections/{id}",
            get(connection::get_connection).delete(connection::delete_connection),
        )
        .route(
            "/api/connections/{id}/query",
            post(query::execute_natural_language_query),
        )
        .route("/api/connections/{id}/queries", get(query::list_queries))
        .route("/api/queries/{id}", get(query::get_query))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
