//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development. Credentials are deliberately optional:
//! a missing token or connection string must never crash startup, it only
//! makes the corresponding subsystem inert (with a logged warning).

use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Postgres connection string. Absent: the storefront runs degraded with
    /// only the health endpoint mounted.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub environment: String,
    /// Shared secret the chat gateway presents when opening its socket.
    /// Absent: the chat channel is not mounted.
    pub chat_token: Option<String>,
    /// Shared secret the dashboard presents on admin requests. Absent: the
    /// admin surface is open (warned at startup).
    pub admin_token: Option<String>,
    /// Key for the completion API. Absent: the composer uses its deterministic
    /// templated replies only.
    pub openai_api_key: Option<String>,
    pub completion_model: String,
    /// Public callback URL handed to the chat platform, when one is used.
    pub webhook_url: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL").ok();

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let environment =
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let chat_token = std::env::var("CHAT_TOKEN").ok();
        let admin_token = std::env::var("ADMIN_TOKEN").ok();
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let completion_model =
            std::env::var("COMPLETION_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let webhook_url = std::env::var("WEBHOOK_URL").ok();

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            environment,
            chat_token,
            admin_token,
            openai_api_key,
            completion_model,
            webhook_url,
        })
    }
}
