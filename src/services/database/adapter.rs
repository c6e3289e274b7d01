// Database adapter trait shared by the MySQL and PostgreSQL backends
use crate::api::middleware::AppError;
use crate::models::ColumnDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Connect timeout applied to every adapter operation
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything needed to open a connection. The password is plaintext here,
/// already decrypted by the vault.
#[derive(Clone)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database_name: String,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("database_name", &self.database_name)
            .finish()
    }
}

/// Query execution result: the fetched rows for a SELECT, otherwise the
/// number of rows the statement touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResult {
    Rows(Vec<Map<String, Value>>),
    Affected { affected_rows: u64 },
}

impl QueryResult {
    pub fn row_count(&self) -> u64 {
        match self {
            QueryResult::Rows(rows) => rows.len() as u64,
            QueryResult::Affected { affected_rows } => *affected_rows,
        }
    }
}

/// True when the trimmed, case-insensitive text starts with `select`.
pub fn is_select_statement(sql: &str) -> bool {
    sql.trim()
        .get(..6)
        .map(|prefix| prefix.eq_ignore_ascii_case("select"))
        .unwrap_or(false)
}

/// Database adapter trait - one connection per call, closed before returning
#[async_trait::async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Names of the user tables, in the order the backend returns them
    async fn list_tables(&self) -> Result<Vec<String>, AppError>;

    /// Column descriptors of one table, in ordinal order
    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>, AppError>;

    /// Run arbitrary SQL. SELECTs return rows; anything else is committed and
    /// returns the affected-row count.
    async fn execute(&self, sql: &str) -> Result<QueryResult, AppError>;

    /// Get database type
    fn database_type(&self) -> &str;
}
