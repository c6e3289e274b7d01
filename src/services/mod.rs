pub mod credential_vault;
pub mod database; // MySQL and PostgreSQL adapters
pub mod db_service;
pub mod llm_service;
pub mod nl_query_service;
pub mod query_service;
pub mod schema_introspector;

pub use credential_vault::CredentialVault;
pub use db_service::*;
pub use llm_service::{ChatMessage, ChatRole, CompletionClient, CompletionRequest, LlmService, OpenAiClient};
pub use nl_query_service::*;
pub use query_service::*;
pub use schema_introspector::*;
