//! Mobile money provider port.
//!
//! Defines the contract for mobile-money rails (e.g., M-Pesa Daraja).
//! Each call sends one request and returns the provider's synchronous
//! acknowledgement; the final outcome arrives later as a callback.
//!
//! # Design
//!
//! - **Local amounts only**: requests carry the payer's local-currency
//!   amount, never the ledger amount
//! - **Ack, not result**: an accepted ack means "queued", not "paid"
//! - **Transport vs rejection**: a transport failure is a [`ProviderError`];
//!   a provider that answers but refuses returns an ack with
//!   `accepted = false`

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::payment::Provider;

/// Port for mobile money integrations.
#[async_trait]
pub trait MobileMoneyProvider: Send + Sync {
    /// Rail this adapter serves.
    fn provider(&self) -> Provider;

    /// Prompt the payer's phone to authorise a collection.
    async fn stk_push(&self, request: &StkPushRequest) -> Result<ProviderAck, ProviderError>;

    /// Pay out to a consumer wallet.
    async fn b2c_payment(&self, request: &B2cRequest) -> Result<ProviderAck, ProviderError>;

    /// Pay out to a business till or paybill.
    async fn b2b_payment(&self, request: &B2bRequest) -> Result<ProviderAck, ProviderError>;
}

/// Collection request (deposit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StkPushRequest {
    /// Whole-unit local amount.
    pub amount: Decimal,

    /// Payer MSISDN, normalised.
    pub phone_number: String,

    /// Shown to the payer; we use the payment ref.
    pub account_reference: String,

    pub description: String,

    pub callback_url: String,
}

/// Consumer payout request (withdrawal to a wallet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct B2cRequest {
    pub amount: Decimal,
    pub phone_number: String,
    pub remarks: String,
    pub occasion: String,
    pub result_url: String,
    pub queue_timeout_url: String,
}

/// Business payout request (withdrawal to a till or paybill).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct B2bRequest {
    pub amount: Decimal,

    /// Receiving shortcode.
    pub receiver_shortcode: String,

    pub account_reference: String,

    /// Requesting MSISDN, when known.
    pub requester: Option<String>,

    pub remarks: String,
    pub result_url: String,
    pub queue_timeout_url: String,
}

/// Synchronous acknowledgement from the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAck {
    /// Whether the provider queued the request.
    pub accepted: bool,

    pub response_code: String,
    pub response_description: String,

    /// Merchant request ID (STK) or conversation ID (B2C/B2B).
    pub provider_tx_id: Option<String>,

    /// Checkout request ID (STK only).
    pub checkout_request_id: Option<String>,

    /// Originator conversation ID (B2C/B2B only).
    pub originator_conversation_id: Option<String>,

    /// Body as sent on the wire, for the audit trail.
    pub request_payload: Value,

    /// Body as received.
    pub response_payload: Value,
}

/// Errors reaching or authenticating with a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderError {
    /// Error code for categorization.
    pub code: ProviderErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Timeout, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidRequest, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ProviderUnavailable, message)
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ProviderError {}

impl From<ProviderError> for DomainError {
    fn from(err: ProviderError) -> Self {
        let code = match err.code {
            ProviderErrorCode::InvalidRequest => ErrorCode::ValidationFailed,
            _ => ErrorCode::ExternalServiceError,
        };
        DomainError::new(code, err.message)
    }
}

/// Provider error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorCode {
    /// Connection could not be established or was dropped.
    NetworkError,

    /// No response within the configured timeout.
    Timeout,

    /// OAuth token could not be obtained.
    AuthenticationError,

    /// Provider refused the request body (4xx).
    InvalidRequest,

    /// Provider-side failure (5xx).
    ProviderUnavailable,

    /// Response could not be understood.
    Unknown,
}

impl ProviderErrorCode {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderErrorCode::NetworkError
                | ProviderErrorCode::Timeout
                | ProviderErrorCode::ProviderUnavailable
        )
    }
}

impl std::fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderErrorCode::NetworkError => "network_error",
            ProviderErrorCode::Timeout => "timeout",
            ProviderErrorCode::AuthenticationError => "authentication_error",
            ProviderErrorCode::InvalidRequest => "invalid_request",
            ProviderErrorCode::ProviderUnavailable => "provider_unavailable",
            ProviderErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}
