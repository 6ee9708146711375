//! Data Transfer Objects for payment intake endpoints.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::Timestamp;
use crate::domain::payment::{
    ErrorContext, NewPayment, Payment, PaymentError, PaymentStatus, PaymentType, Provider,
};

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Body of `POST /api/v1/payments/deposits` and `/withdrawals`.
#[derive(Debug, Clone, Deserialize)]
pub struct InitiatePaymentRequest {
    pub transaction_ref: String,
    pub partner_id: String,
    pub provider: String,
    pub user_id: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub metadata: Value,
}

impl InitiatePaymentRequest {
    /// Converts the body into a domain request. The payment type is set by
    /// the route, not the body.
    pub fn into_new_payment(self, payment_type: PaymentType) -> Result<NewPayment, PaymentError> {
        let provider: Provider = self.provider.parse().map_err(|e| {
            PaymentError::validation(
                e,
                ErrorContext {
                    payment_ref: Some(self.transaction_ref.clone()),
                    partner_id: Some(self.partner_id.clone()),
                    provider: None,
                },
            )
        })?;

        Ok(NewPayment {
            transaction_ref: self.transaction_ref,
            partner_id: self.partner_id,
            provider,
            payment_type,
            user_id: self.user_id,
            phone_number: self.phone_number,
            account_number: self.account_number,
            amount: self.amount,
            currency: self.currency,
            metadata: self.metadata,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Partner-facing view of a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: String,
    pub payment_ref: String,
    pub transaction_ref: String,
    pub partner_id: String,
    pub provider: Provider,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub currency: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub metadata: Value,
    pub callback_received: bool,
    pub partner_notified: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id.to_string(),
            payment_ref: payment.payment_ref.clone(),
            transaction_ref: payment.partner_tx_ref.clone(),
            partner_id: payment.partner_id.to_string(),
            provider: payment.provider,
            payment_type: payment.payment_type,
            status: payment.status,
            amount: payment.amount,
            currency: payment.currency.clone(),
            user_id: payment.user_id.to_string(),
            phone_number: payment.phone_number.clone(),
            account_number: payment.account_number.clone(),
            provider_reference: payment.provider_reference.clone(),
            error_message: payment.error_message.clone(),
            metadata: payment.metadata.clone(),
            callback_received: payment.callback_received,
            partner_notified: payment.partner_notified,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
        }
    }
}

/// Intake response; `replayed` is true when the request matched an
/// existing payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatePaymentResponse {
    #[serde(flatten)]
    pub payment: PaymentResponse,
    pub replayed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn request_json() -> Value {
        json!({
            "transaction_ref": "TX1",
            "partner_id": "P1",
            "provider": "mpesa",
            "user_id": "user-1",
            "phone_number": "0712345678",
            "amount": "10.0",
            "currency": "USD",
            "metadata": {
                "original_amount": "1300",
                "original_currency": "KES",
                "exchange_rate": "130",
                "target_currency": "USD"
            }
        })
    }

    #[test]
    fn request_converts_to_domain_with_route_payment_type() {
        let request: InitiatePaymentRequest = serde_json::from_value(request_json()).unwrap();
        let new = request.into_new_payment(PaymentType::Withdrawal).unwrap();

        assert_eq!(new.provider, Provider::Mpesa);
        assert_eq!(new.payment_type, PaymentType::Withdrawal);
        assert_eq!(new.amount, dec!(10.0));
        assert_eq!(new.metadata["original_amount"], "1300");
    }

    #[test]
    fn request_accepts_numeric_amount() {
        let mut body = request_json();
        body["amount"] = json!(10.5);
        let request: InitiatePaymentRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.amount, dec!(10.5));
    }

    #[test]
    fn unknown_provider_is_a_validation_error() {
        let mut body = request_json();
        body["provider"] = json!("carrier-pigeon");
        let request: InitiatePaymentRequest = serde_json::from_value(body).unwrap();

        let err = request.into_new_payment(PaymentType::Deposit).unwrap_err();
        assert!(matches!(err, PaymentError::Validation { .. }));
    }

    #[test]
    fn response_uses_type_key_and_flattens_into_initiate_response() {
        let request: InitiatePaymentRequest = serde_json::from_value(request_json()).unwrap();
        let payment = Payment::create(request.into_new_payment(PaymentType::Deposit).unwrap())
            .unwrap();

        let body = serde_json::to_value(InitiatePaymentResponse {
            payment: PaymentResponse::from(&payment),
            replayed: false,
        })
        .unwrap();

        assert_eq!(body["type"], "deposit");
        assert_eq!(body["status"], "pending");
        assert_eq!(body["transaction_ref"], "TX1");
        assert_eq!(body["replayed"], false);
        assert!(body.get("provider_reference").is_none());
    }
}
