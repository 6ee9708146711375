//! M-Pesa (Daraja) configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;

const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
const PRODUCTION_BASE_URL: &str = "https://api.safaricom.co.ke";

/// Which Daraja deployment to talk to.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MpesaEnvironment {
    #[default]
    Sandbox,
    Production,
}

/// M-Pesa API credentials and callback settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MpesaConfig {
    #[serde(default)]
    pub environment: MpesaEnvironment,

    /// Overrides the environment's base URL (tests, proxies).
    pub base_url: Option<String>,

    pub consumer_key: String,
    pub consumer_secret: SecretString,

    /// Paybill / till number payments are collected on and paid from.
    pub shortcode: String,

    /// Lipa na M-Pesa Online passkey (STK push).
    pub passkey: SecretString,

    /// Initiator used for B2C / B2B.
    #[serde(default)]
    pub initiator_name: String,

    /// Encrypted initiator password used for B2C / B2B.
    pub security_credential: Option<SecretString>,

    /// Public base URL the provider calls back on.
    pub callback_base_url: String,

    /// Signs the `token` query parameter on callback URLs when set.
    pub callback_secret: Option<SecretString>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Seconds before expiry at which a cached OAuth token is refreshed.
    #[serde(default = "default_token_refresh_margin")]
    pub token_refresh_margin_secs: u64,

    #[serde(default = "default_b2c_command_id")]
    pub b2c_command_id: String,

    #[serde(default = "default_b2b_command_id")]
    pub b2b_command_id: String,
}

impl MpesaConfig {
    /// Base URL for Daraja API calls.
    pub fn api_base_url(&self) -> &str {
        match (&self.base_url, self.environment) {
            (Some(url), _) => url.trim_end_matches('/'),
            (None, MpesaEnvironment::Sandbox) => SANDBOX_BASE_URL,
            (None, MpesaEnvironment::Production) => PRODUCTION_BASE_URL,
        }
    }

    pub fn callback_base(&self) -> &str {
        self.callback_base_url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn token_refresh_margin(&self) -> Duration {
        Duration::from_secs(self.token_refresh_margin_secs)
    }

    /// Validate M-Pesa configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.consumer_key.trim().is_empty() {
            return Err(ValidationError::MissingRequired("MPESA__CONSUMER_KEY"));
        }
        if self.consumer_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("MPESA__CONSUMER_SECRET"));
        }
        if self.passkey.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("MPESA__PASSKEY"));
        }
        if self.shortcode.is_empty() || !self.shortcode.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidShortcode);
        }
        if let Some(url) = &self.base_url {
            if !is_http_url(url) {
                return Err(ValidationError::InvalidUrl("MPESA__BASE_URL"));
            }
        }
        if !is_http_url(&self.callback_base_url) {
            return Err(ValidationError::InvalidUrl("MPESA__CALLBACK_BASE_URL"));
        }
        if *environment == Environment::Production
            && !self.callback_base_url.starts_with("https://")
        {
            return Err(ValidationError::CallbackMustBeHttps);
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 120 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

pub(crate) fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

fn default_request_timeout() -> u64 {
    30
}

fn default_token_refresh_margin() -> u64 {
    60
}

fn default_b2c_command_id() -> String {
    "BusinessPayment".to_string()
}

fn default_b2b_command_id() -> String {
    "BusinessPayBill".to_string()
}

#[cfg(test)]
pub(crate) fn test_config() -> MpesaConfig {
    MpesaConfig {
        environment: MpesaEnvironment::Sandbox,
        base_url: None,
        consumer_key: "consumer-key".to_string(),
        consumer_secret: SecretString::new("consumer-secret".to_string()),
        shortcode: "174379".to_string(),
        passkey: SecretString::new("passkey".to_string()),
        initiator_name: "testapi".to_string(),
        security_credential: Some(SecretString::new("credential".to_string())),
        callback_base_url: "https://pay.example.com/".to_string(),
        callback_secret: None,
        request_timeout_secs: default_request_timeout(),
        token_refresh_margin_secs: default_token_refresh_margin(),
        b2c_command_id: default_b2c_command_id(),
        b2b_command_id: default_b2b_command_id(),
    }
}
