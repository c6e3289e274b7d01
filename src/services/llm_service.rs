use crate::api::middleware::AppError;
use crate::config::Config;
use crate::models::SchemaSnapshot;
use crate::services::database::{DatabaseType, QueryResult};
use reqwest::Client as HttpClient;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const SQL_SYSTEM_PROMPT: &str =
    "You are an expert SQL developer that converts natural language to valid SQL.";
const EXPLANATION_SYSTEM_PROMPT: &str =
    "You are an expert at explaining database query results in plain language.";
const SQL_TEMPERATURE: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }
}

/// One chat completion call. `temperature: None` leaves sampling at the
/// provider default.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
}

/// Text-completion collaborator
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AppError>;
}

/// OpenAI-compatible `/chat/completions` client
pub struct OpenAiClient {
    base_url: String,
    api_key: Option<String>,
    http_client: HttpClient,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.llm.timeout_secs))
            .build()
            .map_err(|e| AppError::Unexpected(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.llm.base_url.trim_end_matches('/').to_string(),
            api_key: config.llm.api_key.clone().filter(|k| !k.trim().is_empty()),
            http_client,
        })
    }

    fn request_body(request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": request.messages,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    /// Timeouts, whether sending or reading the body, are flagged retryable
    fn transport_error(err: reqwest::Error, context: &str) -> AppError {
        if err.is_timeout() {
            AppError::Transport(format!("LLM request timed out (retryable): {}", err))
        } else {
            AppError::Transport(format!("{}: {}", context, err))
        }
    }

    fn extract_content(body: &Value) -> Result<String, AppError> {
        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::Transport("LLM response does not contain a message".to_string())
            })
    }
}

#[async_trait::async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AppError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            AppError::Configuration("OpenAI API key not found.".to_string())
        })?;

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&Self::request_body(&request))
            .send()
            .await
            .map_err(|e| Self::transport_error(e, "Failed to call LLM service"))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Transport(format!(
                "LLM service returned error {}: {}",
                status, error_text
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Self::transport_error(e, "Failed to parse LLM response"))?;

        Self::extract_content(&body)
    }
}

/// Query translator and explanation generator on top of a completion client
pub struct LlmService {
    client: Arc<dyn CompletionClient>,
    sql_model: String,
    explanation_model: String,
}

impl LlmService {
    pub fn new(client: Arc<dyn CompletionClient>, config: &Config) -> Self {
        Self {
            client,
            sql_model: config.llm.sql_model.clone(),
            explanation_model: config.llm.explanation_model.clone(),
        }
    }

    /// Render the snapshot as the plain-text schema block used in prompts
    pub fn prepare_schema_context(snapshot: &SchemaSnapshot) -> String {
        let mut context = String::new();
        for table in &snapshot.tables {
            context.push_str(&format!("Table: {}\n", table.name));
            context.push_str("Columns:\n");
            for column in &table.columns {
                context.push_str(&format!("  - {} ({})", column.name, column.data_type));
                if column.is_primary_key == Some(true) {
                    context.push_str(" PRIMARY KEY");
                }
                context.push('\n');
            }
            context.push('\n');
        }
        context
    }

    pub fn build_sql_prompt(question: &str, snapshot: &SchemaSnapshot, db_type: DatabaseType) -> String {
        format!(
            r#"
You are a SQL generator. Based on the following database schema:

{schema}

Convert this natural language question into a valid, clean, and properly formatted SQL query:
"{question}"

- Use correct {dialect} syntax.
- Only return the SQL query. Do NOT include explanations, code blocks, or markdown.
- Do not wrap the query in backticks or any additional formatting.
"#,
            schema = Self::prepare_schema_context(snapshot),
            question = question,
            dialect = db_type.label(),
        )
    }

    /// Generate SQL query from natural language
    pub async fn generate_sql_from_natural_language(
        &self,
        question: &str,
        snapshot: &SchemaSnapshot,
        db_type: DatabaseType,
    ) -> Result<String, AppError> {
        let request = CompletionRequest {
            model: self.sql_model.clone(),
            messages: vec![
                ChatMessage::system(SQL_SYSTEM_PROMPT),
                ChatMessage::user(Self::build_sql_prompt(question, snapshot, db_type)),
            ],
            temperature: Some(SQL_TEMPERATURE),
        };

        let sql = self.client.complete(request).await?;
        let sql = sql.trim().to_string();
        tracing::debug!("Generated SQL: {}", sql);

        Ok(sql)
    }

    pub fn build_explanation_prompt(question: &str, sql: &str, result: &QueryResult) -> Result<String, AppError> {
        let result_str = serde_json::to_string_pretty(result)
            .map_err(|e| AppError::Unexpected(format!("Failed to serialize query result: {}", e)))?;

        Ok(format!(
            r#"
I generated the following SQL query based on this question:
Question: "{question}"
SQL Query: {sql}

The query produced these results:
{result_str}

Please explain these results in natural language. Use a friendly, concise tone. Include specific data points from the results but don't simply list everything. Focus on answering the original question in a way that would be helpful to someone who doesn't know SQL.
"#
        ))
    }

    /// Summarize a query result for someone who doesn't read SQL
    pub async fn explain_result(
        &self,
        question: &str,
        sql: &str,
        result: &QueryResult,
    ) -> Result<String, AppError> {
        let request = CompletionRequest {
            model: self.explanation_model.clone(),
            messages: vec![
                ChatMessage::system(EXPLANATION_SYSTEM_PROMPT),
                ChatMessage::user(Self::build_explanation_prompt(question, sql, result)?),
            ],
            temperature: None,
        };

        Ok(self.client.complete(request).await?.trim().to_string())
    }
}
