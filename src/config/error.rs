//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Host must be an IP address")]
    InvalidHost,

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Base URL must be absolute (http:// or https://)")]
    InvalidBaseUrl,

    #[error("Base URL must use HTTPS in production")]
    BaseUrlMustBeHttps,

    #[error("Unknown payment provider: {0}")]
    UnknownProvider(String),

    #[error("Provider {0} is enabled without a webhook secret in production")]
    UnsignedWebhooksInProduction(&'static str),

    #[error("Marketplace fee must be below 100% (got {0} bps)")]
    FeeOutOfRange(u32),

    #[error("JWT secret is too short (minimum 32 bytes)")]
    JwtSecretTooShort,
}
