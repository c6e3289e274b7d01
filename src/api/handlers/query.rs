use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::api::handlers::connection::AppState;
use crate::api::middleware::AppError;
use crate::models::{NaturalLanguageQueryRequest, NaturalLanguageQueryResponse, QueryRecord};
use crate::services::database::create_adapter;
use crate::services::{NlQueryService, QueryStage};

fn record_json(record: &QueryRecord) -> serde_json::Value {
    serde_json::json!({
        "id": record.id,
        "connection_id": record.connection_id,
        "natural_language": record.natural_language,
        "sql_query": record.sql_query,
        "result": record.result_value(),
        "explanation": record.explanation,
        "created_at": record.created_at,
    })
}

/// Answer a natural-language question against a registered connection
pub async fn execute_natural_language_query(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<NaturalLanguageQueryRequest>,
) -> Result<(StatusCode, Json<NaturalLanguageQueryResponse>), AppError> {
    tracing::info!("Executing natural language query for connection: {}", id);

    let question = payload.validated_question()?;

    let connection = state
        .storage
        .get_connection(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Connection {} not found", id)))?;

    let adapter = create_adapter(connection.database_type, connection.connection_params());
    let service = NlQueryService::new(state.llm.clone(), state.storage.clone());

    match service.answer(&connection, adapter.as_ref(), question).await {
        Ok((record, result)) => Ok((
            StatusCode::OK,
            Json(NaturalLanguageQueryResponse::answered(&record, result)),
        )),
        Err(failure) => {
            tracing::warn!(
                "Query on connection {} failed at {} stage: {}",
                id,
                failure.stage.as_str(),
                failure.error
            );
            // Pipeline failures are reported in the body; only our own store failing is a server error
            let status = match failure.stage {
                QueryStage::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::OK,
            };
            Ok((status, Json(failure.into_response())))
        }
    }
}

/// Query history of a connection, newest first
pub async fn list_queries(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .storage
        .get_connection(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Connection {} not found", id)))?;

    let records = state.storage.list_query_records(&id).await?;

    Ok(Json(serde_json::json!({
        "queries": records.iter().map(record_json).collect::<Vec<_>>()
    })))
}

/// One history entry with its result decoded
pub async fn get_query(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let record = state
        .storage
        .get_query_record(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Query {} not found", id)))?;

    Ok(Json(record_json(&record)))
}
