// MySQL adapter: one short-lived connection per operation
use crate::api::middleware::AppError;
use crate::models::ColumnDescriptor;
use crate::services::database::adapter::{
    is_select_statement, ConnectionParams, DatabaseAdapter, QueryResult, CONNECT_TIMEOUT,
};
use mysql_async::{prelude::*, Conn, Error as MySqlError, Opts, OptsBuilder, Row, TxOpts, Value as MySqlValue};
use serde_json::{json, Map, Value};

pub struct MySQLAdapter {
    params: ConnectionParams,
}

impl MySQLAdapter {
    pub fn new(params: ConnectionParams) -> Self {
        Self { params }
    }

    fn opts(&self) -> Opts {
        OptsBuilder::default()
            .ip_or_hostname(self.params.host.clone())
            .tcp_port(self.params.port)
            .user(Some(self.params.username.clone()))
            .pass(Some(self.params.password.clone()))
            .db_name(Some(self.params.database_name.clone()))
            .into()
    }

    async fn connect(&self) -> Result<Conn, AppError> {
        tracing::debug!("Opening MySQL connection to {}:{}", self.params.host, self.params.port);

        match tokio::time::timeout(CONNECT_TIMEOUT, Conn::new(self.opts())).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(self.map_error(e, None)),
            Err(_) => Err(self.connectivity_error()),
        }
    }

    async fn close(conn: Conn) {
        if let Err(e) = conn.disconnect().await {
            tracing::warn!("Failed to close MySQL connection cleanly: {}", e);
        }
    }

    fn connectivity_error(&self) -> AppError {
        AppError::Connectivity(format!(
            "Cannot connect to MySQL server at '{}:{}'. Please verify the hostname and port, and ensure the database server is running.",
            self.params.host, self.params.port
        ))
    }

    fn map_error(&self, err: MySqlError, sql: Option<&str>) -> AppError {
        match err {
            MySqlError::Server(server) => {
                self.map_server_error(server.code, &server.state, &server.message, sql)
            }
            MySqlError::Io(e) => {
                tracing::debug!("MySQL I/O error: {}", e);
                self.connectivity_error()
            }
            other => AppError::Unexpected(format!("Database connection error: {}", other)),
        }
    }

    /// Map a server error code / SQLSTATE onto the error taxonomy. Only errors
    /// raised while running a statement (`sql` is set) count as syntax errors.
    fn map_server_error(&self, code: u16, state: &str, message: &str, sql: Option<&str>) -> AppError {
        match code {
            // ER_DBACCESS_DENIED_ERROR, ER_ACCESS_DENIED_ERROR, ER_ACCESS_DENIED_NO_PASSWORD_ERROR
            1044 | 1045 | 1698 => AppError::Authentication(format!(
                "Access denied to MySQL database '{}' on host '{}'. Please verify your credentials and ensure that this server's IP address is allowed in your database's access control settings.",
                self.params.database_name, self.params.host
            )),
            _ if sql.is_some() && (code == 1064 || state.starts_with("42")) => AppError::Syntax {
                message: format!("MySQL syntax error ({}): {}", code, message),
                sql: sql.map(str::to_string),
            },
            _ => AppError::Unexpected(format!("Database connection error ({}): {}", code, message)),
        }
    }

    /// Reshape one `DESCRIBE` row. Only `Key = PRI` marks a primary key.
    fn column_from_describe(
        field: String,
        data_type: String,
        null: &str,
        key: &str,
        default_value: Option<String>,
    ) -> ColumnDescriptor {
        ColumnDescriptor {
            name: field,
            data_type,
            is_nullable: null.eq_ignore_ascii_case("YES"),
            default_value,
            is_primary_key: Some(key == "PRI"),
        }
    }

    fn text(row: &Row, column: &str) -> Option<String> {
        match row.get_opt::<Option<String>, &str>(column) {
            Some(Ok(value)) => value,
            _ => None,
        }
    }

    async fn run(conn: &mut Conn, sql: &str) -> Result<QueryResult, MySqlError> {
        if is_select_statement(sql) {
            let rows: Vec<Row> = conn.query(sql).await?;
            return Ok(QueryResult::Rows(rows.into_iter().map(Self::row_to_json).collect()));
        }

        let mut tx = conn.start_transaction(TxOpts::default()).await?;
        let result = tx.query_iter(sql).await?;
        let affected_rows = result.affected_rows();
        result.drop_result().await?;
        tx.commit().await?;

        Ok(QueryResult::Affected { affected_rows })
    }

    fn row_to_json(row: Row) -> Map<String, Value> {
        let mut row_obj = Map::new();
        for (idx, column) in row.columns_ref().iter().enumerate() {
            let value = match row.get_opt::<MySqlValue, usize>(idx) {
                Some(Ok(mysql_val)) => Self::mysql_value_to_json(mysql_val),
                Some(Err(_)) | None => Value::Null,
            };
            row_obj.insert(column.name_str().to_string(), value);
        }
        row_obj
    }

    /// Helper function to convert MySQL Value to JSON Value
    fn mysql_value_to_json(mysql_val: MySqlValue) -> Value {
        match mysql_val {
            MySqlValue::NULL => Value::Null,
            MySqlValue::Bytes(bytes) => match String::from_utf8(bytes) {
                Ok(s) => json!(s),
                Err(e) => json!(format!("<{} bytes of binary data>", e.into_bytes().len())),
            },
            MySqlValue::Int(i) => json!(i),
            MySqlValue::UInt(u) => json!(u),
            MySqlValue::Float(f) => json!(f),
            MySqlValue::Double(d) => json!(d),
            MySqlValue::Date(y, m, d, 0, 0, 0, 0) => {
                json!(format!("{:04}-{:02}-{:02}", y, m, d))
            }
            MySqlValue::Date(y, m, d, h, min, s, _) => {
                json!(format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, m, d, h, min, s))
            }
            MySqlValue::Time(is_neg, d, h, m, s, _) => {
                let sign = if is_neg { "-" } else { "" };
                let total_hours = d * 24 + h as u32;
                json!(format!("{}{}:{:02}:{:02}", sign, total_hours, m, s))
            }
        }
    }
}

#[async_trait::async_trait]
impl DatabaseAdapter for MySQLAdapter {
    async fn list_tables(&self) -> Result<Vec<String>, AppError> {
        let mut conn = self.connect().await?;
        let result: Result<Vec<String>, _> = conn.query("SHOW TABLES").await;
        Self::close(conn).await;

        result.map_err(|e| self.map_error(e, None))
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>, AppError> {
        let sql = format!("DESCRIBE `{}`", table.replace('`', "``"));

        let mut conn = self.connect().await?;
        let result: Result<Vec<Row>, _> = conn.query(sql.as_str()).await;
        Self::close(conn).await;

        let rows = result.map_err(|e| self.map_error(e, Some(&sql)))?;
        Ok(rows
            .iter()
            .map(|row| {
                Self::column_from_describe(
                    Self::text(row, "Field").unwrap_or_default(),
                    Self::text(row, "Type").unwrap_or_default(),
                    &Self::text(row, "Null").unwrap_or_default(),
                    &Self::text(row, "Key").unwrap_or_default(),
                    Self::text(row, "Default"),
                )
            })
            .collect())
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult, AppError> {
        let mut conn = self.connect().await?;
        let result = Self::run(&mut conn, sql).await;
        Self::close(conn).await;

        result.map_err(|e| self.map_error(e, Some(sql)))
    }

    fn database_type(&self) -> &str {
        "mysql"
    }
}
