//! Partner notifier port - status webhooks to partners.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PartnerId, Timestamp};
use crate::domain::payment::{Payment, PaymentStatus, PaymentType};

use super::PartnerError;

/// Body POSTed to the partner's webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusNotification {
    pub transaction_ref: String,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency: String,
    pub user_id: String,
    pub provider_reference: Option<String>,
    pub error_message: Option<String>,
    pub updated_at: Timestamp,
}

impl StatusNotification {
    pub fn for_payment(payment: &Payment) -> Self {
        Self {
            transaction_ref: payment.partner_tx_ref.clone(),
            payment_type: payment.payment_type,
            status: payment.status,
            amount: payment.amount,
            currency: payment.currency.clone(),
            user_id: payment.user_id.to_string(),
            provider_reference: payment.provider_reference.clone(),
            error_message: payment.error_message.clone(),
            updated_at: payment.updated_at,
        }
    }
}

/// Best-effort delivery of payment status to partners.
///
/// Implementations sign the body when the partner has a webhook secret.
#[async_trait]
pub trait PartnerNotifier: Send + Sync {
    async fn notify(
        &self,
        partner_id: &PartnerId,
        notification: &StatusNotification,
    ) -> Result<(), PartnerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partner_notifier_is_object_safe() {
        fn _accepts_dyn(_notifier: &dyn PartnerNotifier) {}
    }
}
