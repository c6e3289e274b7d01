use crate::api::middleware::AppError;
use crate::models::SchemaSnapshot;
use crate::services::database::DatabaseAdapter;
use std::time::Instant;

/// Builds the per-request schema snapshot fed to the query translator
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// List the tables, then describe each one in the order listed. Any
    /// failure aborts the whole snapshot.
    pub async fn build_snapshot(adapter: &dyn DatabaseAdapter) -> Result<SchemaSnapshot, AppError> {
        let start_time = Instant::now();

        let tables = adapter
            .list_tables()
            .await
            .map_err(|e| e.with_context("Failed to list tables"))?;

        let mut snapshot = SchemaSnapshot::new();
        for table in tables {
            let columns = adapter
                .describe_table(&table)
                .await
                .map_err(|e| e.with_context(&format!("Failed to describe table '{}'", table)))?;
            snapshot.push_table(table, columns);
        }

        tracing::info!(
            "Introspected {} schema: {} tables in {}ms",
            adapter.database_type(),
            snapshot.tables.len(),
            start_time.elapsed().as_millis()
        );

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnDescriptor;
    use crate::services::database::adapter::tests::MockAdapter;

    fn column(name: &str) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            data_type: "int".to_string(),
            is_nullable: false,
            default_value: None,
            is_primary_key: Some(name == "id"),
        }
    }

    #[tokio::test]
    async fn test_snapshot_keeps_listed_order() {
        let adapter = MockAdapter::new()
            .with_table("users", vec![column("id"), column("age")])
            .with_table("orders", vec![column("id")]);

        let snapshot = SchemaIntrospector::build_snapshot(&adapter).await.unwrap();
        assert_eq!(snapshot.table_names(), vec!["users", "orders"]);
        assert_eq!(snapshot.table("users").unwrap().columns.len(), 2);
    }

    #[tokio::test]
    async fn test_second_describe_failure_aborts_snapshot() {
        let adapter = MockAdapter::new()
            .with_table("users", vec![column("id")])
            .with_table("orders", vec![column("id")])
            .with_table("items", vec![column("id")])
            .failing_describe("orders");

        let err = SchemaIntrospector::build_snapshot(&adapter).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to describe table 'orders'"));
        assert_eq!(*adapter.described.lock().unwrap(), vec!["users", "orders"]);
    }

    #[tokio::test]
    async fn test_list_failure_keeps_error_kind() {
        let adapter = MockAdapter::new().unreachable();
        let err = SchemaIntrospector::build_snapshot(&adapter).await.unwrap_err();
        assert!(matches!(err, AppError::Connectivity(_)));
        assert!(err.to_string().starts_with("Failed to list tables"));
    }

    #[tokio::test]
    async fn test_repeated_introspection_is_identical() {
        let adapter = MockAdapter::new()
            .with_table("users", vec![column("id"), column("age"), column("email")])
            .with_table("orders", vec![column("id"), column("user_id")]);

        let first = SchemaIntrospector::build_snapshot(&adapter).await.unwrap();
        let second = SchemaIntrospector::build_snapshot(&adapter).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            *adapter.described.lock().unwrap(),
            vec!["users", "orders", "users", "orders"]
        );
    }

    #[tokio::test]
    async fn test_empty_database_gives_empty_snapshot() {
        let snapshot = SchemaIntrospector::build_snapshot(&MockAdapter::new()).await.unwrap();
        assert!(snapshot.is_empty());
    }
}
