use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::middleware::AppError;
use crate::services::database::QueryResult;

const MIN_QUESTION_CHARS: usize = 10;
const MAX_QUESTION_CHARS: usize = 1000;

/// One answered question. Created once the query has been generated, run and
/// explained; never updated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: String,
    pub connection_id: String,
    pub natural_language: String,
    pub sql_query: String,
    /// JSON-serialized `QueryResult`
    pub result: String,
    pub explanation: String,
    pub created_at: DateTime<Utc>,
}

impl QueryRecord {
    pub fn new(
        connection_id: String,
        natural_language: String,
        sql_query: String,
        result: &QueryResult,
        explanation: String,
    ) -> Result<Self, AppError> {
        let result = serde_json::to_string(result)
            .map_err(|e| AppError::Unexpected(format!("Failed to serialize query result: {}", e)))?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            connection_id,
            natural_language,
            sql_query,
            result,
            explanation,
            created_at: Utc::now(),
        })
    }

    /// The stored result decoded back into JSON; `null` if it cannot be parsed.
    pub fn result_value(&self) -> serde_json::Value {
        serde_json::from_str(&self.result).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Deserialize)]
pub struct NaturalLanguageQueryRequest {
    pub question: String,
}

impl NaturalLanguageQueryRequest {
    pub fn validated_question(&self) -> Result<&str, AppError> {
        let question = self.question.trim();
        let len = question.chars().count();
        if len < MIN_QUESTION_CHARS || len > MAX_QUESTION_CHARS {
            return Err(AppError::Validation(format!(
                "Question must be between {} and {} characters",
                MIN_QUESTION_CHARS, MAX_QUESTION_CHARS
            )));
        }
        Ok(question)
    }
}

/// Response body of the natural-language query endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct NaturalLanguageQueryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

impl NaturalLanguageQueryResponse {
    pub fn answered(record: &QueryRecord, result: QueryResult) -> Self {
        Self {
            success: true,
            query_id: Some(record.id.clone()),
            sql: Some(record.sql_query.clone()),
            result: Some(result),
            explanation: Some(record.explanation.clone()),
            error: None,
            details: None,
            stage: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_question_length_bounds() {
        let short = NaturalLanguageQueryRequest { question: "  count?  ".into() };
        assert!(matches!(short.validated_question(), Err(AppError::Validation(_))));

        let long = NaturalLanguageQueryRequest { question: "x".repeat(1001) };
        assert!(long.validated_question().is_err());

        let ok = NaturalLanguageQueryRequest {
            question: "  How many users signed up last week?  ".into(),
        };
        assert_eq!(ok.validated_question().unwrap(), "How many users signed up last week?");
    }

    #[test]
    fn test_record_serializes_result() {
        let result = QueryResult::Affected { affected_rows: 3 };
        let record = QueryRecord::new(
            "conn-1".into(),
            "Deactivate old users please".into(),
            "UPDATE users SET active = 0".into(),
            &result,
            "Three users were deactivated.".into(),
        )
        .unwrap();

        assert_eq!(record.result, r#"{"affected_rows":3}"#);
        assert_eq!(record.result_value(), json!({"affected_rows": 3}));
    }

    #[test]
    fn test_answered_payload_shape() {
        let result = QueryResult::Rows(vec![json!({"count": 7}).as_object().unwrap().clone()]);
        let record = QueryRecord::new(
            "conn-1".into(),
            "How many users are there?".into(),
            "SELECT COUNT(*) AS count FROM users".into(),
            &result,
            "There are 7 users.".into(),
        )
        .unwrap();

        let payload = serde_json::to_value(NaturalLanguageQueryResponse::answered(&record, result)).unwrap();
        assert_eq!(payload["success"], true);
        assert_eq!(payload["result"], json!([{"count": 7}]));
        assert!(payload.get("error").is_none());
    }
}
