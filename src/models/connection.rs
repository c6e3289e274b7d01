use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::middleware::AppError;
use crate::services::database::{ConnectionParams, DatabaseType};
use crate::services::CredentialVault;

/// A registered external database. The password is only ever held as a
/// vault blob and is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConnection {
    pub id: String,
    pub name: String,
    pub database_type: DatabaseType,
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip)]
    pub password_blob: String,
    pub database_name: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

impl DatabaseConnection {
    pub fn new(
        name: String,
        database_type: DatabaseType,
        params: &ConnectionParams,
        owner_id: String,
    ) -> Result<Self, AppError> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            database_type,
            host: params.host.clone(),
            port: params.port,
            username: params.username.clone(),
            password_blob: CredentialVault::store(&params.password)?,
            database_name: params.database_name.clone(),
            owner_id,
            created_at: Utc::now(),
        })
    }

    /// Connection parameters with the password decrypted through the vault
    pub fn connection_params(&self) -> ConnectionParams {
        ConnectionParams {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: CredentialVault::retrieve(&self.password_blob),
            database_name: self.database_name.clone(),
        }
    }
}

/// Connection details as submitted by a client, before anything is stored
#[derive(Debug, Deserialize)]
pub struct TestConnectionRequest {
    #[serde(default = "default_database_type")]
    pub db_type: String,
    pub host: String,
    pub port: Option<u16>,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub database_name: String,
}

fn default_database_type() -> String {
    "mysql".to_string()
}

impl TestConnectionRequest {
    /// Resolve the dialect and port, and check the required fields.
    pub fn into_params(self) -> Result<(DatabaseType, ConnectionParams), AppError> {
        let db_type = DatabaseType::from_str(&self.db_type)?;

        if self.host.trim().is_empty()
            || self.username.trim().is_empty()
            || self.database_name.trim().is_empty()
        {
            return Err(AppError::Validation(
                "Missing required connection parameters".to_string(),
            ));
        }
        check_length("host", &self.host, 128)?;
        check_length("username", &self.username, 64)?;
        check_length("database_name", &self.database_name, 64)?;

        let port = self.port.unwrap_or_else(|| db_type.default_port());
        if port == 0 {
            return Err(AppError::Validation("Port must be between 1 and 65535".to_string()));
        }

        Ok((
            db_type,
            ConnectionParams {
                host: self.host.trim().to_string(),
                port,
                username: self.username,
                password: self.password,
                database_name: self.database_name.trim().to_string(),
            },
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateConnectionRequest {
    pub name: String,
    pub owner_id: String,
    #[serde(flatten)]
    pub connection: TestConnectionRequest,
}

impl CreateConnectionRequest {
    pub fn validate_name(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Connection name cannot be empty".to_string()));
        }
        if self.owner_id.trim().is_empty() {
            return Err(AppError::Validation("Owner id cannot be empty".to_string()));
        }
        check_length("name", &self.name, 64)
    }
}

fn check_length(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    if value.chars().count() > max {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

/// Outcome of a connectivity test
#[derive(Debug, Serialize, Deserialize)]
pub struct TestConnectionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_type: Option<DatabaseType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestConnectionResponse {
    pub fn connected(db_type: DatabaseType, database_name: &str, tables: Vec<String>) -> Self {
        let message = format!(
            "Successfully connected to {} database \"{}\" with {} tables.",
            db_type.label().to_uppercase(),
            database_name,
            tables.len()
        );
        Self {
            success: true,
            tables: Some(tables),
            db_type: Some(db_type),
            message: Some(message),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            tables: None,
            db_type: None,
            message: None,
            error: Some(error.into()),
        }
    }
}
