//! Application configuration module
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Configuration is loaded with the
//! `NYM_MARKET` prefix and nested values use double underscores as
//! separators.
//!
//! # Example
//!
//! ```no_run
//! use nym_market::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.socket_addr());
//! ```

mod auth;
mod database;
mod error;
mod payment;
mod server;

pub use auth::AuthConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::{BtcpayConfig, LnbitsConfig, PaymentConfig, PayoutWalletConfig};
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, base URL)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Authentication configuration (bearer token validation)
    pub auth: AuthConfig,

    /// Payment configuration (Lightning providers, fees)
    #[serde(default)]
    pub payment: PaymentConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `NYM_MARKET` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `NYM_MARKET__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `NYM_MARKET__PAYMENT__BTCPAY__API_KEY=...` -> `payment.btcpay.api_key = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required environment variables are missing
    /// or values cannot be parsed into the expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("NYM_MARKET")
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
        self.auth.validate()?;
        self.payment.validate(&self.server.environment)?;
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

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var(
            "NYM_MARKET__DATABASE__URL",
            "postgresql://test@localhost/test",
        );
        env::set_var(
            "NYM_MARKET__AUTH__JWT_SECRET",
            "0123456789abcdef0123456789abcdef",
        );
    }

    fn clear_env() {
        env::remove_var("NYM_MARKET__DATABASE__URL");
        env::remove_var("NYM_MARKET__AUTH__JWT_SECRET");
        env::remove_var("NYM_MARKET__SERVER__PORT");
        env::remove_var("NYM_MARKET__PAYMENT__DEFAULT_PROVIDER");
    }

    #[test]
    fn load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.database.url, "postgresql://test@localhost/test");
    }

    #[test]
    fn minimal_config_validates() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn server_defaults_apply() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
        assert_eq!(config.payment.marketplace_fee_bps, 500);
    }

    #[test]
    fn default_provider_is_picked_up() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("NYM_MARKET__PAYMENT__DEFAULT_PROVIDER", "lnbits");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.payment.default_provider.as_deref(), Some("lnbits"));
        assert!(config.validate().is_ok());
    }
}
