use azure_realtime::{ConnectionConfig, HistoryMode};
use secrecy::SecretString;
use std::time::Duration;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Keep your responses concise and natural.";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub connection: ConnectionConfig,
    pub system_prompt: String,
}

impl ChatConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let endpoint = require("AZURE_OPENAI_ENDPOINT")?;
        let api_key = require("AZURE_OPENAI_KEY")?;
        let deployment = require("AZURE_OPENAI_DEPLOYMENT")?;

        let mut connection =
            ConnectionConfig::new(endpoint, deployment, SecretString::from(api_key));

        if let Ok(version) = std::env::var("AZURE_OPENAI_API_VERSION") {
            connection = connection.with_api_version(version);
        }
        if let Ok(mode) = std::env::var("HISTORY_MODE") {
            let mode = mode
                .parse::<HistoryMode>()
                .map_err(|e| ConfigError::InvalidValue("HISTORY_MODE".to_string(), e))?;
            connection = connection.with_history(mode);
        }
        if let Ok(secs) = std::env::var("RECEIVE_TIMEOUT_SECS") {
            let secs = secs.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(
                    "RECEIVE_TIMEOUT_SECS".to_string(),
                    format!("'{secs}' is not a number of seconds"),
                )
            })?;
            connection = connection.with_receive_timeout(Some(Duration::from_secs(secs)));
        }

        let system_prompt = std::env::var("SYSTEM_PROMPT")
            .unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string());

        Ok(Self {
            connection,
            system_prompt,
        })
    }
}

fn require(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}
