// Natural-language query pipeline: schema -> SQL -> execution -> explanation -> history
use crate::api::middleware::AppError;
use crate::models::{DatabaseConnection, NaturalLanguageQueryResponse, QueryRecord};
use crate::services::database::{DatabaseAdapter, QueryResult};
use crate::services::{LlmService, QueryService, SchemaIntrospector};
use crate::storage::SqliteStorage;
use std::sync::Arc;
use std::time::Instant;

const SYNTAX_ERROR_MESSAGE: &str =
    "SQL Error: Syntax error in the generated query. Please try rephrasing your question.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    Schema,
    Translation,
    Execution,
    Explanation,
    Persistence,
}

impl QueryStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStage::Schema => "schema",
            QueryStage::Translation => "translation",
            QueryStage::Execution => "execution",
            QueryStage::Explanation => "explanation",
            QueryStage::Persistence => "persistence",
        }
    }
}

/// A pipeline failure tagged with the stage that produced it
#[derive(Debug)]
pub struct StageFailure {
    pub stage: QueryStage,
    pub error: AppError,
    /// User-facing message
    pub message: String,
    pub sql: Option<String>,
    pub details: Option<String>,
}

impl StageFailure {
    fn new(stage: QueryStage, error: AppError, message: String) -> Self {
        Self {
            stage,
            error,
            message,
            sql: None,
            details: None,
        }
    }

    fn with_sql(mut self, sql: &str) -> Self {
        self.sql = Some(sql.to_string());
        self
    }

    pub fn into_response(self) -> NaturalLanguageQueryResponse {
        NaturalLanguageQueryResponse {
            success: false,
            query_id: None,
            sql: self.sql,
            result: None,
            explanation: None,
            error: Some(self.message),
            details: self.details,
            stage: Some(self.stage.as_str().to_string()),
        }
    }
}

pub struct NlQueryService {
    llm: Arc<LlmService>,
    storage: Arc<SqliteStorage>,
}

impl NlQueryService {
    pub fn new(llm: Arc<LlmService>, storage: Arc<SqliteStorage>) -> Self {
        Self { llm, storage }
    }

    /// Answer one question against `connection`. A history record is written
    /// only after every earlier stage succeeded.
    pub async fn answer(
        &self,
        connection: &DatabaseConnection,
        adapter: &dyn DatabaseAdapter,
        question: &str,
    ) -> Result<(QueryRecord, QueryResult), StageFailure> {
        let start_time = Instant::now();
        let db_label = connection.database_type.as_str().to_uppercase();

        let snapshot = SchemaIntrospector::build_snapshot(adapter).await.map_err(|e| {
            let message = format!("{} connection error: {}", db_label, e);
            StageFailure::new(QueryStage::Schema, e, message)
        })?;

        let sql = self
            .llm
            .generate_sql_from_natural_language(question, &snapshot, connection.database_type)
            .await
            .map_err(|e| {
                let message = format!("Error generating SQL query: {}", e);
                StageFailure::new(QueryStage::Translation, e, message)
            })?;

        let result = QueryService::execute(adapter, &sql).await.map_err(|e| {
            if matches!(e, AppError::Syntax { .. }) {
                let details = e.to_string();
                let mut failure =
                    StageFailure::new(QueryStage::Execution, e, SYNTAX_ERROR_MESSAGE.to_string()).with_sql(&sql);
                failure.details = Some(details);
                failure
            } else {
                let message = format!("Error executing query: {}", e);
                StageFailure::new(QueryStage::Execution, e, message).with_sql(&sql)
            }
        })?;

        let explanation = self.llm.explain_result(question, &sql, &result).await.map_err(|e| {
            let message = format!("Error generating natural language explanation: {}", e);
            StageFailure::new(QueryStage::Explanation, e, message).with_sql(&sql)
        })?;

        let record = QueryRecord::new(
            connection.id.clone(),
            question.to_string(),
            sql.clone(),
            &result,
            explanation,
        )
        .map_err(|e| {
            let message = format!("Failed to save query: {}", e);
            StageFailure::new(QueryStage::Persistence, e, message).with_sql(&sql)
        })?;

        self.storage.save_query_record(&record).await.map_err(|e| {
            let error = AppError::from(e);
            let message = format!("Failed to save query: {}", error);
            StageFailure::new(QueryStage::Persistence, error, message).with_sql(&sql)
        })?;

        tracing::info!(
            "Answered question on connection {} in {}ms ({} rows)",
            connection.id,
            start_time.elapsed().as_millis(),
            result.row_count()
        );

        Ok((record, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::ColumnDescriptor;
    use crate::services::database::adapter::tests::MockAdapter;
    use crate::services::database::{ConnectionParams, DatabaseType};
    use crate::services::llm_service::tests::MockCompletionClient;
    use serde_json::json;
    use tempfile::TempDir;

    fn column(name: &str, data_type: &str, pk: bool) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            data_type: data_type.to_string(),
            is_nullable: !pk,
            default_value: None,
            is_primary_key: Some(pk),
        }
    }

    async fn fixture(
        responses: Vec<Result<String, AppError>>,
    ) -> (TempDir, NlQueryService, Arc<SqliteStorage>, DatabaseConnection, Arc<MockCompletionClient>) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(SqliteStorage::new(dir.path().join("test.db")).await.unwrap());

        let params = ConnectionParams {
            host: "db.internal".into(),
            port: 3306,
            username: "analyst".into(),
            password: "pw".into(),
            database_name: "shop".into(),
        };
        let connection =
            DatabaseConnection::new("Shop".into(), DatabaseType::MySQL, &params, "user-1".into()).unwrap();
        storage.save_connection(&connection).await.unwrap();

        let client = Arc::new(MockCompletionClient::new(responses));
        let llm = Arc::new(LlmService::new(client.clone(), &Config::default()));
        let service = NlQueryService::new(llm, storage.clone());

        (dir, service, storage, connection, client)
    }

    fn users_adapter() -> MockAdapter {
        MockAdapter::new().with_table(
            "users",
            vec![column("id", "int", true), column("created_at", "datetime", false)],
        )
    }

    #[tokio::test]
    async fn test_successful_question_is_recorded() {
        let sql = "SELECT COUNT(*) AS signups FROM users WHERE created_at >= NOW() - INTERVAL 7 DAY";
        let (_dir, service, storage, connection, client) = fixture(vec![
            Ok(format!("  {}\n", sql)),
            Ok("Twelve users signed up last week.".to_string()),
        ])
        .await;
        let adapter = users_adapter()
            .on_execute(|_| Ok(QueryResult::Rows(vec![json!({"signups": 12}).as_object().unwrap().clone()])));

        let (record, result) = service
            .answer(&connection, &adapter, "How many users signed up last week?")
            .await
            .unwrap();

        assert_eq!(record.sql_query, sql);
        assert_eq!(*adapter.executed.lock().unwrap(), vec![sql.to_string()]);
        assert_eq!(result.row_count(), 1);
        assert_eq!(record.explanation, "Twelve users signed up last week.");

        let history = storage.list_query_records(&connection.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].result_value(), json!([{"signups": 12}]));

        let requests = client.requests.lock().await;
        assert!(requests[0].messages[1].content.contains("  - id (int) PRIMARY KEY"));
        assert!(requests[0].messages[1].content.contains("  - created_at (datetime)\n"));
    }

    #[tokio::test]
    async fn test_describe_failure_is_schema_stage_without_record() {
        let (_dir, service, storage, connection, client) = fixture(vec![]).await;
        let adapter = users_adapter()
            .with_table("orders", vec![column("id", "int", true)])
            .failing_describe("orders");

        let failure = service
            .answer(&connection, &adapter, "How many orders were placed?")
            .await
            .unwrap_err();

        assert_eq!(failure.stage, QueryStage::Schema);
        assert!(failure.message.starts_with("MYSQL connection error: Failed to describe table 'orders'"));
        assert!(failure.sql.is_none());
        assert!(client.requests.lock().await.is_empty());
        assert!(storage.list_query_records(&connection.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_syntax_error_returns_sql_without_record() {
        let (_dir, service, storage, connection, _client) =
            fixture(vec![Ok("SELECT * FORM users".to_string())]).await;
        let adapter = users_adapter().on_execute(|sql| {
            Err(AppError::Syntax {
                message: "MySQL syntax error (1064): You have an error in your SQL syntax".to_string(),
                sql: Some(sql.to_string()),
            })
        });

        let failure = service
            .answer(&connection, &adapter, "Show me every user please")
            .await
            .unwrap_err();

        assert_eq!(failure.stage, QueryStage::Execution);
        let payload = serde_json::to_value(failure.into_response()).unwrap();
        assert_eq!(payload["success"], false);
        assert_eq!(payload["sql"], "SELECT * FORM users");
        assert_eq!(payload["error"], SYNTAX_ERROR_MESSAGE);
        assert!(payload["details"].as_str().unwrap().contains("1064"));
        assert_eq!(payload["stage"], "execution");
        assert!(storage.list_query_records(&connection.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_execution_error_keeps_backend_text() {
        let (_dir, service, _storage, connection, _client) =
            fixture(vec![Ok("DELETE FROM users".to_string())]).await;
        let adapter = users_adapter()
            .on_execute(|_| Err(AppError::Unexpected("Database connection error (1205): Lock wait timeout".into())));

        let failure = service
            .answer(&connection, &adapter, "Remove all of the users")
            .await
            .unwrap_err();

        assert_eq!(failure.message, "Error executing query: Database connection error (1205): Lock wait timeout");
        assert_eq!(failure.sql.as_deref(), Some("DELETE FROM users"));
        assert!(failure.details.is_none());
    }

    #[tokio::test]
    async fn test_translation_failure_stops_before_execution() {
        let (_dir, service, storage, connection, _client) =
            fixture(vec![Err(AppError::Configuration("OpenAI API key not found.".into()))]).await;
        let adapter = users_adapter();

        let failure = service
            .answer(&connection, &adapter, "How many users are there?")
            .await
            .unwrap_err();

        assert_eq!(failure.stage, QueryStage::Translation);
        assert!(matches!(failure.error, AppError::Configuration(_)));
        assert!(adapter.executed.lock().unwrap().is_empty());
        assert!(storage.list_query_records(&connection.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_explanation_failure_leaves_no_record() {
        let (_dir, service, storage, connection, _client) = fixture(vec![
            Ok("UPDATE users SET created_at = NOW()".to_string()),
            Err(AppError::Transport("LLM request timed out (retryable)".into())),
        ])
        .await;
        let adapter = users_adapter().on_execute(|_| Ok(QueryResult::Affected { affected_rows: 4 }));

        let failure = service
            .answer(&connection, &adapter, "Touch every user timestamp")
            .await
            .unwrap_err();

        assert_eq!(failure.stage, QueryStage::Explanation);
        assert_eq!(failure.sql.as_deref(), Some("UPDATE users SET created_at = NOW()"));
        assert!(storage.list_query_records(&connection.id).await.unwrap().is_empty());
    }
}
