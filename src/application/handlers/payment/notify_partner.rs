//! NotifyPartnerHandler - Pushes a payment's status to the partner webhook.

use std::sync::Arc;

use crate::domain::foundation::PaymentId;
use crate::domain::payment::{ErrorContext, PaymentError};
use crate::ports::{PartnerNotifier, PaymentRepository, StatusNotification};

pub struct NotifyPartnerHandler {
    payments: Arc<dyn PaymentRepository>,
    notifier: Arc<dyn PartnerNotifier>,
}

impl NotifyPartnerHandler {
    pub fn new(payments: Arc<dyn PaymentRepository>, notifier: Arc<dyn PartnerNotifier>) -> Self {
        Self { payments, notifier }
    }

    /// Delivers the current status.
    ///
    /// Failures come back as `PaymentError::Notification`; the worker
    /// retries the retryable ones with backoff.
    #[tracing::instrument(skip(self))]
    pub async fn handle(&self, payment_id: PaymentId) -> Result<(), PaymentError> {
        let payment = self
            .payments
            .find_by_id(&payment_id)
            .await?
            .ok_or_else(|| PaymentError::not_found(ErrorContext::for_ref(payment_id.to_string())))?;

        let notification = StatusNotification::for_payment(&payment);
        if let Err(e) = self.notifier.notify(&payment.partner_id, &notification).await {
            tracing::warn!(
                payment_ref = %payment.payment_ref,
                partner_id = %payment.partner_id,
                error = %e,
                "Partner notification failed"
            );
            return Err(PaymentError::Notification {
                reason: e.to_string(),
                retryable: e.is_retryable(),
                context: payment.context(),
            });
        }

        self.payments.mark_partner_notified(&payment.id).await?;
        tracing::info!(
            payment_ref = %payment.payment_ref,
            partner_id = %payment.partner_id,
            status = %payment.status,
            "Partner notified"
        );
        Ok(())
    }
}
