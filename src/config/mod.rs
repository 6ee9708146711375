//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `PESA_BRIDGE` prefix and nested values use double underscores as separators.
//! Lists that environment variables cannot express (partners) come from an
//! optional file named by `PESA_BRIDGE_CONFIG`; environment values override it.
//!
//! # Example
//!
//! ```no_run
//! use pesa_bridge::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod mpesa;
mod partner;
mod server;
mod worker;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use mpesa::{MpesaConfig, MpesaEnvironment};
pub use partner::{validate_partners, PartnerConfig};
pub use server::{Environment, ServerConfig};
pub use worker::WorkerConfig;

#[cfg(test)]
pub(crate) use mpesa::test_config as test_mpesa_config;
#[cfg(test)]
pub(crate) use partner::test_partner;

use serde::Deserialize;

/// Environment variable naming an optional configuration file.
pub const CONFIG_FILE_ENV: &str = "PESA_BRIDGE_CONFIG";

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// M-Pesa Daraja credentials and callback settings
    pub mpesa: MpesaConfig,

    /// Partner ledgers and webhooks
    #[serde(default)]
    pub partners: Vec<PartnerConfig>,

    /// Job worker pool and recovery sweep
    #[serde(default)]
    pub worker: WorkerConfig,
}

impl AppConfig {
    /// Load configuration from the optional file and environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads the file named by `PESA_BRIDGE_CONFIG`, if set
    /// 3. Reads environment variables with `PESA_BRIDGE` prefix
    /// 4. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `PESA_BRIDGE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `PESA_BRIDGE__MPESA__SHORTCODE=174379` -> `mpesa.shortcode = "174379"`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required values are missing or cannot be
    /// parsed into the expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&path));
        }

        let config = builder
            .add_source(
                config::Environment::default()
                    .prefix("PESA_BRIDGE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.mpesa.validate(&self.server.environment)?;
        validate_partners(&self.partners)?;
        self.worker.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[(&str, &str)] = &[
        ("PESA_BRIDGE__DATABASE__URL", "postgresql://test@localhost/test"),
        ("PESA_BRIDGE__MPESA__CONSUMER_KEY", "consumer-key"),
        ("PESA_BRIDGE__MPESA__CONSUMER_SECRET", "consumer-secret"),
        ("PESA_BRIDGE__MPESA__SHORTCODE", "174379"),
        ("PESA_BRIDGE__MPESA__PASSKEY", "passkey"),
        ("PESA_BRIDGE__MPESA__CALLBACK_BASE_URL", "https://pay.example.com"),
    ];

    fn set_minimal_env() {
        for (key, value) in VARS {
            env::set_var(key, value);
        }
    }

    fn clear_env() {
        for (key, _) in VARS {
            env::remove_var(key);
        }
        env::remove_var("PESA_BRIDGE__SERVER__PORT");
        env::remove_var("PESA_BRIDGE__SERVER__ENVIRONMENT");
        env::remove_var("PESA_BRIDGE__WORKER__CONCURRENCY");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.database.url, "postgresql://test@localhost/test");
        assert_eq!(config.mpesa.shortcode, "174379");
        assert!(config.partners.is_empty());
    }

    #[test]
    fn test_validate_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("PESA_BRIDGE__SERVER__PORT", "3000");
        env::set_var("PESA_BRIDGE__WORKER__CONCURRENCY", "4");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.worker.concurrency, 4);
    }

    #[test]
    fn test_is_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("PESA_BRIDGE__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
    }

    #[test]
    fn test_missing_mpesa_section_fails() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("PESA_BRIDGE__DATABASE__URL", "postgresql://test@localhost/test");
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_err());
    }
}
