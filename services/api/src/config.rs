//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

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
    pub log_level: Level,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub openai_api_key: Option<String>,
    pub ingredient_model: String,
    pub routine_model: String,
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

        // --- Load Server Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Backend-as-a-Service Settings ---
        let supabase_url = std::env::var("SUPABASE_URL")
            .map_err(|_| ConfigError::MissingVar("SUPABASE_URL".to_string()))?;
        let supabase_anon_key = std::env::var("SUPABASE_ANON_KEY")
            .map_err(|_| ConfigError::MissingVar("SUPABASE_ANON_KEY".to_string()))?;

        // --- Load API Keys (as optional) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();

        // --- Load Adapter-specific Settings ---
        let ingredient_model =
            std::env::var("INGREDIENT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let routine_model =
            std::env::var("ROUTINE_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        Ok(Self {
            bind_address,
            log_level,
            supabase_url,
            supabase_anon_key,
            openai_api_key,
            ingredient_model,
            routine_model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One sequential test: the process environment is shared, so the
    // scenarios must not run in parallel with each other.
    #[test]
    fn from_env_applies_defaults_and_reports_missing_vars() {
        std::env::remove_var("SUPABASE_URL");
        std::env::set_var("SUPABASE_ANON_KEY", "anon");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "SUPABASE_URL"));

        std::env::set_var("SUPABASE_URL", "https://proj.supabase.co");
        std::env::remove_var("BIND_ADDRESS");
        std::env::remove_var("RUST_LOG");
        std::env::remove_var("INGREDIENT_MODEL");
        std::env::remove_var("ROUTINE_MODEL");
        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.ingredient_model, "gpt-4o-mini");
        assert_eq!(config.routine_model, "gpt-4o");

        std::env::set_var("BIND_ADDRESS", "not-an-address");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "BIND_ADDRESS"));
        std::env::remove_var("BIND_ADDRESS");
    }
}
