use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub sql_model: String,
    pub explanation_model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub style: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Try to load from .env file first so its values act like real env vars
        let _ = dotenv::dotenv();

        let mut builder = config::Config::builder()
            .set_default("database.url", "./nl_query.db")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("llm.base_url", "https://api.openai.com/v1")?
            .set_default("llm.sql_model", "gpt-4o")?
            .set_default("llm.explanation_model", "gpt-4o-mini")?
            .set_default("llm.timeout_secs", 60)?
            .set_default("logging.level", "info")?
            .set_default("logging.style", "auto")?;

        if let Ok(database_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", database_url)?;
        }

        if let Ok(host) = env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>().unwrap_or(3000))?;
        }

        if let Ok(base_url) = env::var("LLM_BASE_URL") {
            builder = builder.set_override("llm.base_url", base_url)?;
        }

        // OPENAI_API_KEY wins over the generic gateway key
        let api_key = env::var("OPENAI_API_KEY")
            .or_else(|_| env::var("LLM_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());
        if let Some(api_key) = api_key {
            builder = builder.set_override("llm.api_key", Some(api_key))?;
        }

        if let Ok(model) = env::var("LLM_SQL_MODEL") {
            builder = builder.set_override("llm.sql_model", model)?;
        }

        if let Ok(model) = env::var("LLM_EXPLANATION_MODEL") {
            builder = builder.set_override("llm.explanation_model", model)?;
        }

        if let Ok(timeout) = env::var("LLM_TIMEOUT_SECS") {
            builder = builder.set_override("llm.timeout_secs", timeout.parse::<u64>().unwrap_or(60))?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        if let Ok(log_style) = env::var("RUST_LOG_STYLE") {
            builder = builder.set_override("logging.style", log_style)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Built-in defaults, without reading the environment
impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "./nl_query.db".to_string(),
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            llm: LlmConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: None,
                sql_model: "gpt-4o".to_string(),
                explanation_model: "gpt-4o-mini".to_string(),
                timeout_secs: 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                style: "auto".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        // Clear environment variables for this test
        env::remove_var("DATABASE_URL");
        env::remove_var("HOST");
        env::remove_var("PORT");
        env::remove_var("LLM_SQL_MODEL");
        env::remove_var("LLM_EXPLANATION_MODEL");
        env::remove_var("LLM_TIMEOUT_SECS");

        let config = Config::from_env();
        assert!(config.is_ok());

        let config = config.unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.llm.sql_model, "gpt-4o");
        assert_eq!(config.llm.explanation_model, "gpt-4o-mini");
        assert_eq!(config.llm.timeout_secs, 60);
    }

    #[test]
    fn test_server_address() {
        let config = Config::from_env().unwrap();
        assert_eq!(
            config.server_address(),
            format!("{}:{}", config.server.host, config.server.port)
        );
    }
}
