use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::models::{
    CreateConnectionRequest, DatabaseConnection, TestConnectionRequest, TestConnectionResponse,
};
use crate::services::{DbService, LlmService};
use crate::storage::SqliteStorage;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<SqliteStorage>,
    pub llm: Arc<LlmService>,
}

#[derive(Debug, Deserialize)]
pub struct ListConnectionsParams {
    pub owner_id: Option<String>,
}

/// Check that the submitted credentials can reach the database
pub async fn test_connection(Json(payload): Json<TestConnectionRequest>) -> Json<TestConnectionResponse> {
    Json(DbService::test_connection(payload).await)
}

/// List connections, optionally filtered by owner
pub async fn list_connections(
    State(state): State<AppState>,
    Query(params): Query<ListConnectionsParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let connections = state
        .storage
        .list_connections(params.owner_id.as_deref())
        .await?;

    Ok(Json(serde_json::json!({
        "connections": connections
    })))
}

/// Register a new database connection once it has been reached successfully
pub async fn create_connection(
    State(state): State<AppState>,
    Json(payload): Json<CreateConnectionRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    payload.validate_name()?;
    let CreateConnectionRequest { name, owner_id, connection } = payload;
    let (db_type, params) = connection.into_params()?;

    let tables = DbService::list_tables(db_type, params.clone()).await?;

    let db_connection = DatabaseConnection::new(name.trim().to_string(), db_type, &params, owner_id)?;
    state.storage.save_connection(&db_connection).await?;

    tracing::info!(
        "Registered {} connection {} ({} tables)",
        db_type.as_str(),
        db_connection.id,
        tables.len()
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "connection": db_connection,
            "tables": tables
        })),
    ))
}

/// Get connection details
pub async fn get_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let connection = state
        .storage
        .get_connection(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Connection {} not found", id)))?;

    Ok(Json(serde_json::json!(connection)))
}

/// Delete a connection together with its query history
pub async fn delete_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    tracing::info!("Deleting connection: {}", id);

    let deleted = state.storage.delete_connection(&id).await.map_err(|e| {
        tracing::error!("Failed to delete connection {}: {}", id, e);
        AppError::from(e)
    })?;

    if deleted {
        tracing::info!("Connection deleted successfully: {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        tracing::warn!("Connection not found for deletion: {}", id);
        Err(AppError::NotFound(format!("Connection {} not found", id)))
    }
}
