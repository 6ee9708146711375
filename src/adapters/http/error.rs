//! Error body and status mapping shared by every HTTP adapter.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::payment::PaymentError;

/// Standard error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn not_found(resource_type: &str, id: &str) -> Self {
        Self::new("NOT_FOUND", format!("{} not found: {}", resource_type, id))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Maps a payment error to its status code and body.
///
/// Infrastructure and ledger failures are logged in full but answered with a
/// generic message.
pub fn handle_payment_error(err: PaymentError) -> Response {
    let (status, body) = match &err {
        PaymentError::Validation { source, .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorResponse::new("VALIDATION_FAILED", source.to_string()),
        ),
        PaymentError::UnsupportedProvider { provider, .. } => (
            StatusCode::BAD_REQUEST,
            ErrorResponse::new(
                "UNSUPPORTED_PROVIDER",
                format!("provider '{}' is not supported", provider),
            ),
        ),
        PaymentError::NotFound { context } => (
            StatusCode::NOT_FOUND,
            ErrorResponse::not_found("Payment", context.payment_ref.as_deref().unwrap_or("-")),
        ),
        PaymentError::CallbackCorrelation { reason, .. } => (
            StatusCode::NOT_FOUND,
            ErrorResponse::new("CALLBACK_NOT_CORRELATED", reason.clone()),
        ),
        PaymentError::CallbackParse { .. } => (
            StatusCode::BAD_REQUEST,
            ErrorResponse::bad_request(err.to_string()),
        ),
        PaymentError::CallbackUnauthorized { .. } => (
            StatusCode::UNAUTHORIZED,
            ErrorResponse::new("UNAUTHORIZED", "callback token rejected"),
        ),
        PaymentError::InvalidTransition { from, to, .. } => (
            StatusCode::CONFLICT,
            ErrorResponse::new(
                "INVALID_TRANSITION",
                format!("cannot move payment from {} to {}", from, to),
            ),
        ),
        PaymentError::DispatchFailed { reason, .. } => (
            StatusCode::BAD_GATEWAY,
            ErrorResponse::new("PROVIDER_UNAVAILABLE", reason.clone()),
        ),
        PaymentError::ProviderRejected {
            code, description, ..
        } => (
            StatusCode::BAD_GATEWAY,
            ErrorResponse::new("PROVIDER_REJECTED", description.clone())
                .with_details(serde_json::json!({ "provider_code": code })),
        ),
        PaymentError::Settlement { .. }
        | PaymentError::Notification { .. }
        | PaymentError::Infrastructure(_) => {
            tracing::error!(error = %err, "Payment request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::internal("An internal error occurred"),
            )
        }
    };

    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ValidationError;
    use crate::domain::payment::{CallbackFlow, ErrorContext, PaymentStatus};

    #[test]
    fn error_response_not_found_names_resource() {
        let error = ErrorResponse::not_found("Payment", "TX1");
        assert_eq!(error.code, "NOT_FOUND");
        assert!(error.message.contains("TX1"));
    }

    #[test]
    fn validation_maps_to_422() {
        let err = PaymentError::validation(
            ValidationError::empty_field("currency"),
            ErrorContext::for_ref("TX1"),
        );
        assert_eq!(
            handle_payment_error(err).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn correlation_failure_maps_to_404() {
        let err = PaymentError::correlation("unknown key", Some("ws_9".into()), ErrorContext::default());
        assert_eq!(handle_payment_error(err).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn parse_failure_maps_to_400() {
        let err = PaymentError::parse(CallbackFlow::Stk, "missing Body");
        assert_eq!(handle_payment_error(err).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unauthorized_callback_maps_to_401() {
        let err = PaymentError::CallbackUnauthorized {
            context: ErrorContext::for_ref("TX1"),
        };
        assert_eq!(handle_payment_error(err).status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn invalid_transition_maps_to_409() {
        let err = PaymentError::InvalidTransition {
            from: PaymentStatus::Completed,
            to: PaymentStatus::Failed,
            context: ErrorContext::for_ref("TX1"),
        };
        assert_eq!(handle_payment_error(err).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn infrastructure_maps_to_500() {
        let err = PaymentError::Infrastructure("pool timed out".into());
        assert_eq!(
            handle_payment_error(err).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
