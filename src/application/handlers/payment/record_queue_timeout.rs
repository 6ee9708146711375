//! RecordQueueTimeoutHandler - Stores a B2C/B2B queue-timeout notice.
//!
//! The provider posts here when a payout sat in its queue too long. The
//! final result callback still decides the status, so only the raw payload
//! is kept.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::payment::{CallbackUrls, ErrorContext, PaymentError};
use crate::ports::PaymentRepository;

/// Command carrying one queue-timeout notice.
#[derive(Debug, Clone)]
pub struct RecordQueueTimeoutCommand {
    pub payment_ref: String,
    pub token: Option<String>,
    pub payload: Value,
}

pub struct RecordQueueTimeoutHandler {
    payments: Arc<dyn PaymentRepository>,
    callback_urls: CallbackUrls,
}

impl RecordQueueTimeoutHandler {
    pub fn new(payments: Arc<dyn PaymentRepository>, callback_urls: CallbackUrls) -> Self {
        Self {
            payments,
            callback_urls,
        }
    }

    #[tracing::instrument(skip(self, cmd), fields(payment_ref = %cmd.payment_ref))]
    pub async fn handle(&self, cmd: RecordQueueTimeoutCommand) -> Result<(), PaymentError> {
        let context = ErrorContext::for_ref(&cmd.payment_ref);
        if !self
            .callback_urls
            .verify(&cmd.payment_ref, cmd.token.as_deref())
        {
            tracing::warn!("Queue timeout token rejected");
            return Err(PaymentError::CallbackUnauthorized { context });
        }

        let payment = self
            .payments
            .find_by_ref(&cmd.payment_ref)
            .await?
            .ok_or_else(|| {
                PaymentError::correlation("no payment for queue timeout ref", None, context)
            })?;

        self.payments
            .record_callback(&payment.id, &cmd.payload, None)
            .await?;

        tracing::warn!(status = %payment.status, "Provider reported queue timeout");
        Ok(())
    }
}
