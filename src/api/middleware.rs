use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing model-access credential or other required setting
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Host/port unreachable or server down
    #[error("{0}")]
    Connectivity(String),

    /// Wrong database credentials
    #[error("{0}")]
    Authentication(String),

    /// Malformed query; carries the offending SQL when known
    #[error("{message}")]
    Syntax { message: String, sql: Option<String> },

    #[error("Unsupported database type: {0}")]
    UnsupportedDialect(String),

    /// The language-model call itself failed
    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Unexpected(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Failure in the local metadata store
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    /// Prefix the message with `context`, keeping the variant (and any SQL) intact.
    pub fn with_context(self, context: &str) -> Self {
        let wrap = |msg: String| format!("{}: {}", context, msg);
        match self {
            AppError::Configuration(msg) => AppError::Configuration(wrap(msg)),
            AppError::Connectivity(msg) => AppError::Connectivity(wrap(msg)),
            AppError::Authentication(msg) => AppError::Authentication(wrap(msg)),
            AppError::Syntax { message, sql } => AppError::Syntax {
                message: wrap(message),
                sql,
            },
            AppError::UnsupportedDialect(tag) => AppError::UnsupportedDialect(tag),
            AppError::Transport(msg) => AppError::Transport(wrap(msg)),
            AppError::Unexpected(msg) => AppError::Unexpected(wrap(msg)),
            AppError::Validation(msg) => AppError::Validation(wrap(msg)),
            AppError::NotFound(msg) => AppError::NotFound(wrap(msg)),
            AppError::Storage(msg) => AppError::Storage(wrap(msg)),
        }
    }

    /// The SQL text attached to a syntax failure, if any
    pub fn sql(&self) -> Option<&str> {
        match self {
            AppError::Syntax { sql, .. } => sql.as_deref(),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Connectivity(_) => "CONNECTION_ERROR",
            AppError::Authentication(_) => "AUTHENTICATION_ERROR",
            AppError::Syntax { .. } => "SQL_SYNTAX_ERROR",
            AppError::UnsupportedDialect(_) => "UNSUPPORTED_DATABASE_TYPE",
            AppError::Transport(_) => "LLM_SERVICE_ERROR",
            AppError::Unexpected(_) => "UNEXPECTED_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Storage(_) => "STORAGE_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Connectivity(_)
            | AppError::Authentication(_)
            | AppError::Syntax { .. }
            | AppError::UnsupportedDialect(_)
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Transport(_) => StatusCode::BAD_GATEWAY,
            AppError::Configuration(_) | AppError::Unexpected(_) | AppError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut detail = match &self {
            AppError::Configuration(msg) => ErrorDetail::new(
                self.code(),
                format!("{} Please set OPENAI_API_KEY to use natural language queries.", msg),
            ),
            _ => ErrorDetail::new(self.code(), self.to_string()),
        };

        if let Some(sql) = self.sql() {
            detail = detail.with_details(sql);
        }

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

/// Convert rusqlite::Error to AppError
impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_format() {
        let error = AppError::NotFound("Connection not found".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_detail_creation() {
        let detail = ErrorDetail::new("TEST_CODE", "Test message");
        assert_eq!(detail.code, "TEST_CODE");
        assert_eq!(detail.message, "Test message");
        assert!(detail.details.is_none());
    }

    #[test]
    fn test_with_context_keeps_variant_and_sql() {
        let error = AppError::Syntax {
            message: "MySQL syntax error: near 'FORM'".to_string(),
            sql: Some("SELECT * FORM users".to_string()),
        }
        .with_context("Error executing query");

        assert!(matches!(error, AppError::Syntax { .. }));
        assert_eq!(error.sql(), Some("SELECT * FORM users"));
        assert!(error.to_string().starts_with("Error executing query: MySQL syntax error"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::UnsupportedDialect("oracle".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Transport("timeout".into()).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Configuration("missing key".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unsupported_dialect_message() {
        let error = AppError::UnsupportedDialect("oracle".to_string());
        assert_eq!(error.to_string(), "Unsupported database type: oracle");
    }
}
