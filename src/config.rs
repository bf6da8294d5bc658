use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    pub database_path: String,
    pub allowed_origins: String,
    pub log_level: String,
    pub session_secret_key: String,
    pub use_secure_cookies: bool,
}

fn required_var(name: &str) -> Result<String, config::ConfigError> {
    env::var(name).map_err(|_| {
        config::ConfigError::Message(format!(
            "FATAL: Environment variable '{}' is not set in your .env file.",
            name
        ))
    })
}

/// The session key must be 128 hex characters (64 bytes).
fn validate_session_key(key: &str) -> Result<(), config::ConfigError> {
    if key.len() != 128 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(config::ConfigError::Message(
            "FATAL: 'SESSION_SECRET_KEY' must be 128 hexadecimal characters long (64 bytes).".to_string(),
        ));
    }
    Ok(())
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path).map_err(|e| {
            config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}",
                env_path.display(),
                e
            ))
        })?;

        let database_path = required_var("DATABASE_PATH")?;
        if Path::new(&database_path).is_relative() {
            return Err(config::ConfigError::Message(format!(
                "FATAL: The 'DATABASE_PATH' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
                database_path
            )));
        }

        let session_secret_key = required_var("SESSION_SECRET_KEY")?;
        validate_session_key(&session_secret_key)?;

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_default();
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let use_secure_cookies = env::var("USE_SECURE_COOKIES")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        config::Config::builder()
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml))
            .set_override("database_path", database_path)?
            .set_override("session_secret_key", session_secret_key)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("use_secure_cookies", use_secure_cookies)?
            .build()?
            .try_deserialize()
    }

    /// Full path to the community database file inside its own folder.
    pub fn community_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path).join("community").join("community.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_must_be_128_hex_chars() {
        assert!(validate_session_key(&"ab".repeat(64)).is_ok());
        assert!(validate_session_key(&"ab".repeat(10)).is_err());
        assert!(validate_session_key(&"zz".repeat(64)).is_err());
    }
}
