//! Payment-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Validation | 422 |
//! | UnsupportedProvider | 400 |
//! | NotFound | 404 |
//! | CallbackCorrelation | 404 |
//! | CallbackParse | 400 |
//! | CallbackUnauthorized | 401 |
//! | InvalidTransition | 409 |
//! | DispatchFailed / ProviderRejected | 502 |
//! | Settlement / Notification / Infrastructure | 500 |

use std::fmt;

use thiserror::Error;

use super::{CallbackFlow, PaymentStatus, Provider};
use crate::domain::foundation::{DomainError, ValidationError};

/// Identifies the payment an error is about, for operator triage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub payment_ref: Option<String>,
    pub partner_id: Option<String>,
    pub provider: Option<Provider>,
}

impl ErrorContext {
    pub fn new(
        payment_ref: impl Into<String>,
        partner_id: impl Into<String>,
        provider: Provider,
    ) -> Self {
        Self {
            payment_ref: Some(payment_ref.into()),
            partner_id: Some(partner_id.into()),
            provider: Some(provider),
        }
    }

    pub fn for_ref(payment_ref: impl Into<String>) -> Self {
        Self {
            payment_ref: Some(payment_ref.into()),
            ..Default::default()
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "payment_ref={} partner_id={} provider={}",
            self.payment_ref.as_deref().unwrap_or("-"),
            self.partner_id.as_deref().unwrap_or("-"),
            self.provider.map(|p| p.as_str()).unwrap_or("-"),
        )
    }
}

/// Errors raised along the payment lifecycle.
#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("{source} ({context})")]
    Validation {
        source: ValidationError,
        context: ErrorContext,
    },

    #[error("provider '{provider}' is not supported ({context})")]
    UnsupportedProvider {
        provider: Provider,
        context: ErrorContext,
    },

    #[error("payment not found ({context})")]
    NotFound { context: ErrorContext },

    #[error("provider dispatch failed: {reason} ({context})")]
    DispatchFailed { reason: String, context: ErrorContext },

    #[error("provider rejected request [{code}]: {description} ({context})")]
    ProviderRejected {
        code: String,
        description: String,
        context: ErrorContext,
    },

    #[error("callback not correlated: {reason} ({context})")]
    CallbackCorrelation {
        reason: String,
        correlation_key: Option<String>,
        context: ErrorContext,
    },

    #[error("{flow} callback payload could not be parsed: {reason}")]
    CallbackParse { flow: CallbackFlow, reason: String },

    #[error("callback token rejected ({context})")]
    CallbackUnauthorized { context: ErrorContext },

    #[error("cannot move payment from {from} to {to} ({context})")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
        context: ErrorContext,
    },

    #[error("settlement failed: {reason} ({context})")]
    Settlement { reason: String, context: ErrorContext },

    #[error("partner notification failed: {reason} ({context})")]
    Notification {
        reason: String,
        retryable: bool,
        context: ErrorContext,
    },

    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl PaymentError {
    pub fn validation(source: ValidationError, context: ErrorContext) -> Self {
        PaymentError::Validation { source, context }
    }

    pub fn not_found(context: ErrorContext) -> Self {
        PaymentError::NotFound { context }
    }

    pub fn correlation(
        reason: impl Into<String>,
        correlation_key: Option<String>,
        context: ErrorContext,
    ) -> Self {
        PaymentError::CallbackCorrelation {
            reason: reason.into(),
            correlation_key,
            context,
        }
    }

    pub fn parse(flow: CallbackFlow, reason: impl Into<String>) -> Self {
        PaymentError::CallbackParse {
            flow,
            reason: reason.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        PaymentError::Infrastructure(message.into())
    }

    /// Whether a background job hitting this error should run again.
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Notification { retryable, .. } => *retryable,
            PaymentError::Infrastructure(_) => true,
            _ => false,
        }
    }

    /// Stable machine-readable code for API responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::Validation { .. } => "VALIDATION_FAILED",
            PaymentError::UnsupportedProvider { .. } => "UNSUPPORTED_PROVIDER",
            PaymentError::NotFound { .. } => "PAYMENT_NOT_FOUND",
            PaymentError::DispatchFailed { .. } => "PROVIDER_DISPATCH_FAILED",
            PaymentError::ProviderRejected { .. } => "PROVIDER_REJECTED",
            PaymentError::CallbackCorrelation { .. } => "CALLBACK_NOT_CORRELATED",
            PaymentError::CallbackParse { .. } => "CALLBACK_UNPARSEABLE",
            PaymentError::CallbackUnauthorized { .. } => "CALLBACK_UNAUTHORIZED",
            PaymentError::InvalidTransition { .. } => "INVALID_STATE_TRANSITION",
            PaymentError::Settlement { .. } => "SETTLEMENT_FAILED",
            PaymentError::Notification { .. } => "NOTIFICATION_FAILED",
            PaymentError::Infrastructure(_) => "INTERNAL_ERROR",
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            PaymentError::Validation { context, .. }
            | PaymentError::UnsupportedProvider { context, .. }
            | PaymentError::NotFound { context }
            | PaymentError::DispatchFailed { context, .. }
            | PaymentError::ProviderRejected { context, .. }
            | PaymentError::CallbackCorrelation { context, .. }
            | PaymentError::CallbackUnauthorized { context }
            | PaymentError::InvalidTransition { context, .. }
            | PaymentError::Settlement { context, .. }
            | PaymentError::Notification { context, .. } => Some(context),
            PaymentError::CallbackParse { .. } | PaymentError::Infrastructure(_) => None,
        }
    }
}

impl From<DomainError> for PaymentError {
    fn from(err: DomainError) -> Self {
        PaymentError::Infrastructure(err.to_string())
    }
}
