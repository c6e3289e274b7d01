// PostgreSQL adapter: one short-lived connection per operation
use crate::api::middleware::AppError;
use crate::models::ColumnDescriptor;
use crate::services::database::adapter::{
    is_select_statement, ConnectionParams, DatabaseAdapter, QueryResult, CONNECT_TIMEOUT,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use std::error::Error as StdError;
use tokio::task::JoinHandle;
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::{Client, NoTls, Row};
use uuid::Uuid;

const LIST_TABLES_SQL: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = 'public'
    ORDER BY table_name
"#;

const DESCRIBE_TABLE_SQL: &str = r#"
    SELECT
        column_name::text,
        data_type::text,
        is_nullable::text,
        column_default::text
    FROM information_schema.columns
    WHERE table_schema = 'public' AND table_name = $1
    ORDER BY ordinal_position
"#;

pub struct PostgreSQLAdapter {
    params: ConnectionParams,
}

/// An open client plus the task driving its socket
struct PgSession {
    client: Client,
    driver: JoinHandle<()>,
}

impl PgSession {
    async fn close(self) {
        // Dropping the client terminates the connection task
        drop(self.client);
        if let Err(e) = self.driver.await {
            tracing::warn!("PostgreSQL connection task ended abnormally: {}", e);
        }
    }
}

impl PostgreSQLAdapter {
    pub fn new(params: ConnectionParams) -> Self {
        Self { params }
    }

    async fn connect(&self) -> Result<PgSession, AppError> {
        tracing::debug!("Opening PostgreSQL connection to {}:{}", self.params.host, self.params.port);

        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.params.host)
            .port(self.params.port)
            .user(&self.params.username)
            .password(&self.params.password)
            .dbname(&self.params.database_name)
            .connect_timeout(CONNECT_TIMEOUT);

        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| self.map_error(e, None))?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(PgSession { client, driver })
    }

    fn connectivity_error(&self) -> AppError {
        AppError::Connectivity(format!(
            "Cannot connect to PostgreSQL server at '{}:{}'. Please verify the hostname and port, and ensure the database server is running.",
            self.params.host, self.params.port
        ))
    }

    fn map_error(&self, err: tokio_postgres::Error, sql: Option<&str>) -> AppError {
        if let Some(db_error) = err.as_db_error() {
            return self.map_db_error(db_error.code().code(), db_error.message(), sql);
        }

        let io_failure = err
            .source()
            .map(|source| source.downcast_ref::<std::io::Error>().is_some())
            .unwrap_or(false);
        if io_failure || err.is_closed() || err.to_string().starts_with("error connecting to server") {
            tracing::debug!("PostgreSQL transport error: {}", err);
            return self.connectivity_error();
        }

        AppError::Unexpected(format!("PostgreSQL error: {}", err))
    }

    /// Map a SQLSTATE onto the error taxonomy. Class 28 is an authorization
    /// failure; class 42 while running a statement is a syntax/reference error.
    fn map_db_error(&self, code: &str, message: &str, sql: Option<&str>) -> AppError {
        if code.starts_with("28") {
            return AppError::Authentication(format!(
                "Authentication failed for PostgreSQL database '{}' on host '{}'. Please check your credentials and ensure that this server's IP address is allowed in your database's access control settings.",
                self.params.database_name, self.params.host
            ));
        }

        if sql.is_some() && code.starts_with("42") {
            return AppError::Syntax {
                message: format!("PostgreSQL syntax error ({}): {}", code, message),
                sql: sql.map(str::to_string),
            };
        }

        AppError::Unexpected(format!("PostgreSQL error ({}): {}", code, message))
    }

    /// Reshape an `information_schema.columns` row. Key information is not
    /// available here, so the primary-key flag stays empty.
    fn column_from_catalog(
        name: String,
        data_type: String,
        is_nullable: &str,
        default_value: Option<String>,
    ) -> ColumnDescriptor {
        ColumnDescriptor {
            name,
            data_type,
            is_nullable: is_nullable == "YES",
            default_value,
            is_primary_key: None,
        }
    }

    async fn run(client: &mut Client, sql: &str) -> Result<QueryResult, tokio_postgres::Error> {
        if is_select_statement(sql) {
            let rows = client.query(sql, &[]).await?;
            return Ok(QueryResult::Rows(rows.iter().map(Self::row_to_json).collect()));
        }

        let tx = client.transaction().await?;
        let affected_rows = tx.execute(sql, &[]).await?;
        tx.commit().await?;

        Ok(QueryResult::Affected { affected_rows })
    }

    fn row_to_json(row: &Row) -> Map<String, Value> {
        let mut row_obj = Map::new();
        for (idx, column) in row.columns().iter().enumerate() {
            row_obj.insert(column.name().to_string(), Self::value_to_json(row, idx, column.type_()));
        }
        row_obj
    }

    fn value_to_json(row: &Row, idx: usize, ty: &Type) -> Value {
        fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Option<T> {
            row.try_get::<_, Option<T>>(idx).ok().flatten()
        }

        match *ty {
            Type::BOOL => get::<bool>(row, idx).map(|v| json!(v)),
            Type::INT2 => get::<i16>(row, idx).map(|v| json!(v)),
            Type::INT4 => get::<i32>(row, idx).map(|v| json!(v)),
            Type::INT8 => get::<i64>(row, idx).map(|v| json!(v)),
            Type::OID => get::<u32>(row, idx).map(|v| json!(v)),
            Type::FLOAT4 => get::<f32>(row, idx).map(|v| json!(v)),
            Type::FLOAT8 => get::<f64>(row, idx).map(|v| json!(v)),
            // Values outside Decimal's 28-digit range come back as null
            Type::NUMERIC => get::<Decimal>(row, idx).map(|v| json!(v.to_string())),
            Type::UUID => get::<Uuid>(row, idx).map(|v| json!(v.to_string())),
            Type::JSON | Type::JSONB => get::<Value>(row, idx),
            Type::DATE => get::<NaiveDate>(row, idx).map(|v| json!(v.to_string())),
            Type::TIME => get::<NaiveTime>(row, idx).map(|v| json!(v.to_string())),
            Type::TIMESTAMP => get::<NaiveDateTime>(row, idx).map(|v| json!(v.to_string())),
            Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx).map(|v| json!(v.to_rfc3339())),
            _ => match row.try_get::<_, Option<String>>(idx) {
                Ok(v) => v.map(|s| json!(s)),
                // For types that can't be read as text, show the type name as placeholder
                Err(_) => Some(json!(format!("<{}>", ty.name()))),
            },
        }
        .unwrap_or(Value::Null)
    }
}

#[async_trait::async_trait]
impl DatabaseAdapter for PostgreSQLAdapter {
    async fn list_tables(&self) -> Result<Vec<String>, AppError> {
        let session = self.connect().await?;
        let result = session.client.query(LIST_TABLES_SQL, &[]).await;
        session.close().await;

        let rows = result.map_err(|e| self.map_error(e, None))?;
        rows.iter()
            .map(|row| {
                row.try_get::<_, String>(0)
                    .map_err(|e| AppError::Unexpected(format!("PostgreSQL error: {}", e)))
            })
            .collect()
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>, AppError> {
        let session = self.connect().await?;
        let result = session.client.query(DESCRIBE_TABLE_SQL, &[&table]).await;
        session.close().await;

        let rows = result.map_err(|e| self.map_error(e, None))?;
        rows.iter()
            .map(|row| {
                let name: String = row.try_get(0)?;
                let data_type: String = row.try_get(1)?;
                let is_nullable: String = row.try_get(2)?;
                let default_value: Option<String> = row.try_get(3)?;
                Ok(Self::column_from_catalog(name, data_type, &is_nullable, default_value))
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()
            .map_err(|e| AppError::Unexpected(format!("PostgreSQL error: {}", e)))
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult, AppError> {
        let mut session = self.connect().await?;
        let result = Self::run(&mut session.client, sql).await;
        session.close().await;

        result.map_err(|e| self.map_error(e, Some(sql)))
    }

    fn database_type(&self) -> &str {
        "postgresql"
    }
}
