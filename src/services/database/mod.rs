// Database abstraction layer for the two supported dialects
pub mod adapter;
pub mod mysql;
pub mod postgresql;

pub use adapter::{
    is_select_statement, ConnectionParams, DatabaseAdapter, QueryResult, CONNECT_TIMEOUT,
};
pub use mysql::MySQLAdapter;
pub use postgresql::PostgreSQLAdapter;

use crate::api::middleware::AppError;
use serde::{Deserialize, Serialize};

/// Database type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    MySQL,
    PostgreSQL,
}

impl DatabaseType {
    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s.trim().to_lowercase().as_str() {
            "mysql" => Ok(DatabaseType::MySQL),
            "postgresql" => Ok(DatabaseType::PostgreSQL),
            _ => Err(AppError::UnsupportedDialect(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::MySQL => "mysql",
            DatabaseType::PostgreSQL => "postgresql",
        }
    }

    /// Human-readable name, also used as the SQL syntax label in prompts
    pub fn label(&self) -> &'static str {
        match self {
            DatabaseType::MySQL => "MySQL",
            DatabaseType::PostgreSQL => "PostgreSQL",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            DatabaseType::MySQL => 3306,
            DatabaseType::PostgreSQL => 5432,
        }
    }
}

/// Build the adapter for a dialect. Nothing connects until an operation runs.
pub fn create_adapter(db_type: DatabaseType, params: ConnectionParams) -> Box<dyn DatabaseAdapter> {
    match db_type {
        DatabaseType::MySQL => Box::new(MySQLAdapter::new(params)),
        DatabaseType::PostgreSQL => Box::new(PostgreSQLAdapter::new(params)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConnectionParams {
        ConnectionParams {
            host: "localhost".into(),
            port: 1,
            username: "u".into(),
            password: "p".into(),
            database_name: "d".into(),
        }
    }

    #[test]
    fn test_parse_database_type() {
        assert_eq!(DatabaseType::from_str("mysql").unwrap(), DatabaseType::MySQL);
        assert_eq!(DatabaseType::from_str("MySQL").unwrap(), DatabaseType::MySQL);
        assert_eq!(DatabaseType::from_str("PostgreSQL").unwrap(), DatabaseType::PostgreSQL);
    }

    #[test]
    fn test_unknown_database_type_rejected() {
        for tag in ["oracle", "sqlite", "postgres", ""] {
            match DatabaseType::from_str(tag) {
                Err(AppError::UnsupportedDialect(t)) => assert_eq!(t, tag),
                other => panic!("expected UnsupportedDialect for {:?}, got {:?}", tag, other),
            }
        }
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(DatabaseType::MySQL.default_port(), 3306);
        assert_eq!(DatabaseType::PostgreSQL.default_port(), 5432);
    }

    #[test]
    fn test_create_adapter_dispatch() {
        assert_eq!(create_adapter(DatabaseType::MySQL, params()).database_type(), "mysql");
        assert_eq!(
            create_adapter(DatabaseType::PostgreSQL, params()).database_type(),
            "postgresql"
        );
    }

    #[test]
    fn test_serde_tags() {
        assert_eq!(serde_json::to_string(&DatabaseType::PostgreSQL).unwrap(), "\"postgresql\"");
        let parsed: DatabaseType = serde_json::from_str("\"mysql\"").unwrap();
        assert_eq!(parsed, DatabaseType::MySQL);
    }
}
