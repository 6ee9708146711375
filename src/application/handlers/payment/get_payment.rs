//! GetPaymentHandler - Query handler for a partner's payment.

use std::sync::Arc;

use crate::domain::foundation::PartnerId;
use crate::domain::payment::{ErrorContext, Payment, PaymentError};
use crate::ports::PaymentRepository;

/// Query for one payment by the partner's own reference.
#[derive(Debug, Clone)]
pub struct GetPaymentQuery {
    pub partner_id: String,
    pub transaction_ref: String,
}

pub struct GetPaymentHandler {
    payments: Arc<dyn PaymentRepository>,
}

impl GetPaymentHandler {
    pub fn new(payments: Arc<dyn PaymentRepository>) -> Self {
        Self { payments }
    }

    pub async fn handle(&self, query: GetPaymentQuery) -> Result<Payment, PaymentError> {
        let context = ErrorContext {
            payment_ref: Some(query.transaction_ref.clone()),
            partner_id: Some(query.partner_id.clone()),
            provider: None,
        };
        let partner_id = PartnerId::new(query.partner_id.trim())
            .map_err(|e| PaymentError::validation(e, context.clone()))?;

        self.payments
            .find_by_partner_ref(&partner_id, query.transaction_ref.trim())
            .await?
            .ok_or_else(|| PaymentError::not_found(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryPaymentStore;
    use crate::domain::payment::test_support::pending_deposit;

    fn query(partner_id: &str, transaction_ref: &str) -> GetPaymentQuery {
        GetPaymentQuery {
            partner_id: partner_id.to_string(),
            transaction_ref: transaction_ref.to_string(),
        }
    }

    #[tokio::test]
    async fn returns_payment_for_owning_partner() {
        let store = Arc::new(InMemoryPaymentStore::new());
        let payment = pending_deposit();
        store.put_payment(payment.clone()).await;

        let found = GetPaymentHandler::new(store)
            .handle(query("P1", "TX1"))
            .await
            .unwrap();

        assert_eq!(found.id, payment.id);
    }

    #[tokio::test]
    async fn other_partner_gets_not_found() {
        let store = Arc::new(InMemoryPaymentStore::new());
        store.put_payment(pending_deposit()).await;

        let err = GetPaymentHandler::new(store)
            .handle(query("P2", "TX1"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "PAYMENT_NOT_FOUND");
    }

    #[tokio::test]
    async fn blank_partner_is_validation_error() {
        let store = Arc::new(InMemoryPaymentStore::new());

        let err = GetPaymentHandler::new(store)
            .handle(query(" ", "TX1"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "VALIDATION_FAILED");
    }
}
