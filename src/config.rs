use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub market_data_api_url: String,
    pub market_data_api_key: Option<String>,
    pub backup_url: Option<String>,
    pub backup_token: Option<String>,
    /// Upper bound on retry time for one provider call.
    pub sync_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = required(&env_map, "DATABASE_PATH")?;
        let market_data_api_url = required(&env_map, "MARKET_DATA_API_URL")?;

        let sync_timeout_secs = env_map
            .get("SYNC_TIMEOUT_SECS")
            .map(|s| s.as_str())
            .unwrap_or("30")
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "SYNC_TIMEOUT_SECS".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            market_data_api_url,
            market_data_api_key: optional(&env_map, "MARKET_DATA_API_KEY"),
            backup_url: optional(&env_map, "BACKUP_URL"),
            backup_token: optional(&env_map, "BACKUP_TOKEN"),
            sync_timeout: Duration::from_secs(sync_timeout_secs),
        })
    }

    pub fn backup_enabled(&self) -> bool {
        self.backup_url.is_some()
    }
}

fn required(env_map: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    optional(env_map, key).ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}

/// Blank values count as unset.
fn optional(env_map: &HashMap<String, String>, key: &str) -> Option<String> {
    env_map
        .get(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
