use crate::api::middleware::AppError;
use crate::services::database::{DatabaseAdapter, QueryResult};
use std::time::Instant;

/// Runs generated SQL against the target database
pub struct QueryService;

impl QueryService {
    /// Execute a SQL query using a database adapter. SELECTs come back as rows,
    /// any other statement as its committed affected-row count.
    pub async fn execute(adapter: &dyn DatabaseAdapter, sql: &str) -> Result<QueryResult, AppError> {
        let start_time = Instant::now();

        let result = adapter.execute(sql).await;
        let execution_time_ms = start_time.elapsed().as_millis();

        match &result {
            Ok(QueryResult::Rows(rows)) => tracing::info!(
                "{} query returned {} rows in {}ms",
                adapter.database_type(),
                rows.len(),
                execution_time_ms
            ),
            Ok(QueryResult::Affected { affected_rows }) => tracing::info!(
                "{} statement affected {} rows in {}ms",
                adapter.database_type(),
                affected_rows,
                execution_time_ms
            ),
            Err(e) => tracing::warn!(
                "{} query failed after {}ms: {}",
                adapter.database_type(),
                execution_time_ms,
                e
            ),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::database::adapter::tests::MockAdapter;
    use crate::services::database::is_select_statement;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn adapter() -> MockAdapter {
        MockAdapter::new().on_execute(|sql| {
            if is_select_statement(sql) {
                Ok(QueryResult::Rows(vec![json!({"id": 1}).as_object().unwrap().clone()]))
            } else {
                Ok(QueryResult::Affected { affected_rows: 3 })
            }
        })
    }

    #[tokio::test]
    async fn test_select_returns_rows() {
        let result = assert_ok!(QueryService::execute(&adapter(), "  select id from users").await);
        assert!(matches!(result, QueryResult::Rows(ref rows) if rows.len() == 1));
    }

    #[tokio::test]
    async fn test_update_returns_affected_count() {
        let result = assert_ok!(QueryService::execute(&adapter(), "UPDATE users SET active = 0").await);
        assert_eq!(result, QueryResult::Affected { affected_rows: 3 });
        assert_eq!(serde_json::to_value(&result).unwrap(), json!({"affected_rows": 3}));
    }

    #[tokio::test]
    async fn test_failure_passes_through() {
        let adapter = MockAdapter::new().on_execute(|sql| {
            Err(AppError::Syntax {
                message: "MySQL syntax error (1064): near 'FORM'".to_string(),
                sql: Some(sql.to_string()),
            })
        });
        let err = assert_err!(QueryService::execute(&adapter, "SELECT * FORM users").await);
        assert_eq!(err.sql(), Some("SELECT * FORM users"));
    }
}
