use crate::models::{DatabaseConnection, QueryRecord};
use crate::services::database::DatabaseType;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Result as SqliteResult, Row};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

const CONNECTION_COLUMNS: &str =
    "id, name, database_type, host, port, username, password_blob, database_name, owner_id, created_at";
const QUERY_COLUMNS: &str =
    "id, connection_id, natural_language, sql_query, result, explanation, created_at";

/// SQLite storage for registered connections and their query history
/// Uses tokio::Mutex for async-friendly locking
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        // Handle SQLite URL format (sqlite:./path or sqlite://path)
        let path_str = db_path.as_ref().to_string_lossy();
        let clean_path: &str = if path_str.starts_with("sqlite:") {
            path_str.trim_start_matches("sqlite:").trim_start_matches("//")
        } else {
            path_str.as_ref()
        };

        let conn = Connection::open(clean_path)?;
        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Initialize database schema
    async fn init_schema(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().await;

        // Enable foreign key constraints so history goes with its connection
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS connections (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                database_type TEXT NOT NULL,
                host TEXT NOT NULL,
                port INTEGER NOT NULL,
                username TEXT NOT NULL,
                password_blob TEXT NOT NULL,
                database_name TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS queries (
                id TEXT PRIMARY KEY,
                connection_id TEXT NOT NULL,
                natural_language TEXT NOT NULL,
                sql_query TEXT NOT NULL,
                result TEXT NOT NULL,
                explanation TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (connection_id) REFERENCES connections(id) ON DELETE CASCADE
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_connections_owner ON connections(owner_id, created_at DESC)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_queries_connection ON queries(connection_id, created_at DESC)",
            [],
        )?;

        Ok(())
    }

    fn format_timestamp(ts: &DateTime<Utc>) -> String {
        // Fixed-width so that text ordering matches time ordering
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_timestamp(idx: usize, value: String) -> SqliteResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn row_to_connection(row: &Row<'_>) -> SqliteResult<DatabaseConnection> {
        let database_type = DatabaseType::from_str(&row.get::<_, String>(2)?)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

        Ok(DatabaseConnection {
            id: row.get(0)?,
            name: row.get(1)?,
            database_type,
            host: row.get(3)?,
            port: row.get(4)?,
            username: row.get(5)?,
            password_blob: row.get(6)?,
            database_name: row.get(7)?,
            owner_id: row.get(8)?,
            created_at: Self::parse_timestamp(9, row.get(9)?)?,
        })
    }

    fn row_to_query_record(row: &Row<'_>) -> SqliteResult<QueryRecord> {
        Ok(QueryRecord {
            id: row.get(0)?,
            connection_id: row.get(1)?,
            natural_language: row.get(2)?,
            sql_query: row.get(3)?,
            result: row.get(4)?,
            explanation: row.get(5)?,
            created_at: Self::parse_timestamp(6, row.get(6)?)?,
        })
    }

    /// Save a connection to the database
    pub async fn save_connection(&self, conn: &DatabaseConnection) -> SqliteResult<()> {
        let db_conn = self.conn.lock().await;
        db_conn.execute(
            &format!(
                "INSERT INTO connections ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                CONNECTION_COLUMNS
            ),
            rusqlite::params![
                conn.id,
                conn.name,
                conn.database_type.as_str(),
                conn.host,
                conn.port,
                conn.username,
                conn.password_blob,
                conn.database_name,
                conn.owner_id,
                Self::format_timestamp(&conn.created_at),
            ],
        )?;
        Ok(())
    }

    /// Get a connection by ID
    pub async fn get_connection(&self, id: &str) -> SqliteResult<Option<DatabaseConnection>> {
        let db_conn = self.conn.lock().await;
        let mut stmt = db_conn.prepare(&format!(
            "SELECT {} FROM connections WHERE id = ?1",
            CONNECTION_COLUMNS
        ))?;

        match stmt.query_row(rusqlite::params![id], Self::row_to_connection) {
            Ok(conn) => Ok(Some(conn)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// List connections, newest first, optionally only those of one owner
    pub async fn list_connections(&self, owner_id: Option<&str>) -> SqliteResult<Vec<DatabaseConnection>> {
        let db_conn = self.conn.lock().await;
        let mut stmt = db_conn.prepare(&format!(
            "SELECT {} FROM connections WHERE (?1 IS NULL OR owner_id = ?1) ORDER BY created_at DESC, rowid DESC",
            CONNECTION_COLUMNS
        ))?;

        let rows = stmt.query_map(rusqlite::params![owner_id], Self::row_to_connection)?;

        let mut connections = Vec::new();
        for row in rows {
            connections.push(row?);
        }
        Ok(connections)
    }

    /// Delete a connection; its query history goes with it
    pub async fn delete_connection(&self, id: &str) -> SqliteResult<bool> {
        let db_conn = self.conn.lock().await;
        let rows_affected = db_conn.execute("DELETE FROM connections WHERE id = ?1", rusqlite::params![id])?;
        Ok(rows_affected > 0)
    }

    /// Append one answered question to the history
    pub async fn save_query_record(&self, record: &QueryRecord) -> SqliteResult<()> {
        let db_conn = self.conn.lock().await;
        db_conn.execute(
            &format!(
                "INSERT INTO queries ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                QUERY_COLUMNS
            ),
            rusqlite::params![
                record.id,
                record.connection_id,
                record.natural_language,
                record.sql_query,
                record.result,
                record.explanation,
                Self::format_timestamp(&record.created_at),
            ],
        )?;
        Ok(())
    }

    pub async fn get_query_record(&self, id: &str) -> SqliteResult<Option<QueryRecord>> {
        let db_conn = self.conn.lock().await;
        let mut stmt = db_conn.prepare(&format!("SELECT {} FROM queries WHERE id = ?1", QUERY_COLUMNS))?;

        match stmt.query_row(rusqlite::params![id], Self::row_to_query_record) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// History of one connection, newest first
    pub async fn list_query_records(&self, connection_id: &str) -> SqliteResult<Vec<QueryRecord>> {
        let db_conn = self.conn.lock().await;
        let mut stmt = db_conn.prepare(&format!(
            "SELECT {} FROM queries WHERE connection_id = ?1 ORDER BY created_at DESC, rowid DESC",
            QUERY_COLUMNS
        ))?;

        let rows = stmt.query_map(rusqlite::params![connection_id], Self::row_to_query_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}
