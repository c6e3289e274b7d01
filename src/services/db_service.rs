use crate::api::middleware::AppError;
use crate::models::{TestConnectionRequest, TestConnectionResponse};
use crate::services::database::{create_adapter, ConnectionParams, DatabaseType};

/// Connectivity checks against external databases
pub struct DbService;

impl DbService {
    /// Connect and list the tables. Proves the credentials work before a
    /// connection is registered.
    pub async fn list_tables(
        db_type: DatabaseType,
        params: ConnectionParams,
    ) -> Result<Vec<String>, AppError> {
        tracing::info!(
            "Testing {} connection to {}:{}/{}",
            db_type.as_str(),
            params.host,
            params.port,
            params.database_name
        );

        let adapter = create_adapter(db_type, params);
        let tables = adapter.list_tables().await?;

        tracing::info!("Successfully connected to {} database ({} tables)", db_type.as_str(), tables.len());
        Ok(tables)
    }

    /// Validate the request, then try it. Unsupported dialects are rejected
    /// before any network activity.
    pub async fn test_connection(request: TestConnectionRequest) -> TestConnectionResponse {
        let (db_type, params) = match request.into_params() {
            Ok(resolved) => resolved,
            Err(e) => return TestConnectionResponse::failed(e.to_string()),
        };
        let database_name = params.database_name.clone();

        match Self::list_tables(db_type, params).await {
            Ok(tables) => TestConnectionResponse::connected(db_type, &database_name, tables),
            Err(e) => {
                tracing::warn!("Connection test failed: {}", e);
                TestConnectionResponse::failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(db_type: &str, port: u16) -> TestConnectionRequest {
        TestConnectionRequest {
            db_type: db_type.to_string(),
            host: "127.0.0.1".to_string(),
            port: Some(port),
            username: "analyst".to_string(),
            password: "pw".to_string(),
            database_name: "shop".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unsupported_dialect_rejected_without_connecting() {
        let response = DbService::test_connection(request("oracle", 1521)).await;
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Unsupported database type: oracle"));
        assert!(response.tables.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_failure() {
        let response = DbService::test_connection(request("mysql", 1)).await;
        assert!(!response.success);
        assert!(response.error.is_some());
    }
}
