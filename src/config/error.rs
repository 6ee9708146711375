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
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid socket address: {0}")]
    InvalidSocketAddr(String),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Invalid URL for {0}")]
    InvalidUrl(&'static str),

    #[error("Callback base URL must use HTTPS in production")]
    CallbackMustBeHttps,

    #[error("M-Pesa shortcode must be numeric")]
    InvalidShortcode,

    #[error("Partner '{0}' is configured more than once")]
    DuplicatePartner(String),

    #[error("Partner entry has an empty partner_id")]
    EmptyPartnerId,

    #[error("Worker concurrency must be between 1 and 256")]
    InvalidConcurrency,

    #[error("Worker batch size must be at least 1")]
    InvalidBatchSize,

    #[error("Notification attempts must be at least 1")]
    InvalidMaxAttempts,
}
