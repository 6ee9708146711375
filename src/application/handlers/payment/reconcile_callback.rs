//! ReconcileCallbackHandler - Applies a provider webhook to its payment.
//!
//! The payment ref in the callback URL is the trust anchor; the payload's
//! correlation key must match a provider transaction of that payment.
//! Nothing is mutated for a callback that does not correlate.
//!
//! Duplicate deliveries are absorbed by the compare-and-set status update:
//! only the delivery that moves the payment out of `processing` enqueues
//! follow-up jobs.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::payment::{
    CallbackFlow, CallbackResult, CallbackUrls, ErrorContext, Payment, PaymentError, PaymentJob,
    PaymentStatus, ProviderTransaction, ProviderTransactionStatus,
};
use crate::ports::{CallbackParser, JobOutbox, PaymentRepository, ProviderTransactionRepository};

/// Settlement runs once; a failure is left for manual review.
pub const SETTLE_MAX_ATTEMPTS: u32 = 1;

/// Command carrying one inbound provider callback.
#[derive(Debug, Clone)]
pub struct ReconcileCallbackCommand {
    pub flow: CallbackFlow,
    pub payment_ref: String,
    /// `token` query parameter from the callback URL.
    pub token: Option<String>,
    pub payload: Value,
}

/// What the callback did to the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Completed,
    Failed,
    /// The payment was already terminal; nothing was enqueued.
    AlreadyFinal,
}

/// Handler for `ReconcileCallback`.
pub struct ReconcileCallbackHandler {
    payments: Arc<dyn PaymentRepository>,
    transactions: Arc<dyn ProviderTransactionRepository>,
    outbox: Arc<dyn JobOutbox>,
    parser: Arc<dyn CallbackParser>,
    callback_urls: CallbackUrls,
    notification_max_attempts: u32,
}

impl ReconcileCallbackHandler {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        transactions: Arc<dyn ProviderTransactionRepository>,
        outbox: Arc<dyn JobOutbox>,
        parser: Arc<dyn CallbackParser>,
        callback_urls: CallbackUrls,
        notification_max_attempts: u32,
    ) -> Self {
        Self {
            payments,
            transactions,
            outbox,
            parser,
            callback_urls,
            notification_max_attempts,
        }
    }

    #[tracing::instrument(
        skip(self, cmd),
        fields(
            flow = %cmd.flow,
            payment_ref = %cmd.payment_ref,
            correlation_key = tracing::field::Empty,
        )
    )]
    pub async fn handle(
        &self,
        cmd: ReconcileCallbackCommand,
    ) -> Result<ReconcileOutcome, PaymentError> {
        if !self
            .callback_urls
            .verify(&cmd.payment_ref, cmd.token.as_deref())
        {
            tracing::warn!("Callback token rejected");
            return Err(PaymentError::CallbackUnauthorized {
                context: ErrorContext::for_ref(&cmd.payment_ref),
            });
        }

        // 1. Parse with the flow-specific parser
        let result = self.parser.parse(cmd.flow, &cmd.payload).map_err(|e| {
            tracing::warn!(error = %e, "Callback payload could not be parsed");
            e
        })?;
        if let Some(key) = &result.correlation_key {
            tracing::Span::current().record("correlation_key", key.as_str());
        }

        // 2-3. Resolve payment and provider transaction
        let (payment, transaction) = self.correlate(&cmd, &result).await.map_err(|e| {
            tracing::warn!(error = %e, "Callback dropped");
            e
        })?;

        // 4. Raw payload is kept whatever the outcome
        self.payments
            .record_callback(
                &payment.id,
                &cmd.payload,
                result.provider_receipt.as_deref(),
            )
            .await?;

        if payment.is_terminal() {
            tracing::info!(status = %payment.status, "Duplicate callback for final payment");
            return Ok(ReconcileOutcome::AlreadyFinal);
        }

        // 5. Drive the terminal transition
        if result.success {
            self.complete(&payment, &transaction, &result).await
        } else {
            self.fail(&payment, &transaction, &result).await
        }
    }

    async fn correlate(
        &self,
        cmd: &ReconcileCallbackCommand,
        result: &CallbackResult,
    ) -> Result<(Payment, ProviderTransaction), PaymentError> {
        let key = result.correlation_key.clone();

        let payment = self
            .payments
            .find_by_ref(&cmd.payment_ref)
            .await?
            .ok_or_else(|| {
                PaymentError::correlation(
                    "no payment for callback ref",
                    key.clone(),
                    ErrorContext::for_ref(&cmd.payment_ref),
                )
            })?;
        let context = payment.context();

        let Some(key) = key else {
            return Err(PaymentError::correlation(
                "callback carries no correlation key",
                None,
                context,
            ));
        };

        let transaction = self
            .transactions
            .find_by_correlation_key(&key)
            .await?
            .filter(|t| t.payment_id == payment.id && t.matches(&key))
            .ok_or_else(|| {
                PaymentError::correlation(
                    "no provider transaction of this payment has the key",
                    Some(key.clone()),
                    context.clone(),
                )
            })?;

        if transaction.transaction_type != cmd.flow.transaction_type() {
            return Err(PaymentError::correlation(
                format!(
                    "{} callback for a {} transaction",
                    cmd.flow, transaction.transaction_type
                ),
                Some(key),
                context,
            ));
        }

        Ok((payment, transaction))
    }

    async fn complete(
        &self,
        payment: &Payment,
        transaction: &ProviderTransaction,
        result: &CallbackResult,
    ) -> Result<ReconcileOutcome, PaymentError> {
        if let Some(amount) = result.amount {
            let expected = payment.local_amount().amount;
            if amount != expected {
                tracing::warn!(
                    reported = %amount,
                    expected = %expected,
                    "Callback amount differs from dispatched amount"
                );
            }
        }

        if !self
            .payments
            .transition_status(&payment.id, PaymentStatus::Completed)
            .await?
        {
            tracing::info!("Payment finalized by a concurrent callback");
            return Ok(ReconcileOutcome::AlreadyFinal);
        }
        self.finish_transaction(transaction, ProviderTransactionStatus::Completed, result)
            .await?;

        self.outbox
            .enqueue(
                PaymentJob::Settle {
                    payment_id: payment.id,
                },
                SETTLE_MAX_ATTEMPTS,
            )
            .await?;
        self.enqueue_notify(payment).await?;

        tracing::info!(
            receipt = result.provider_receipt.as_deref().unwrap_or("-"),
            "Payment completed"
        );
        Ok(ReconcileOutcome::Completed)
    }

    async fn fail(
        &self,
        payment: &Payment,
        transaction: &ProviderTransaction,
        result: &CallbackResult,
    ) -> Result<ReconcileOutcome, PaymentError> {
        if !self
            .payments
            .fail_with_error(&payment.id, &result.result_description)
            .await?
        {
            tracing::info!("Payment finalized by a concurrent callback");
            return Ok(ReconcileOutcome::AlreadyFinal);
        }
        self.finish_transaction(transaction, ProviderTransactionStatus::Failed, result)
            .await?;
        self.enqueue_notify(payment).await?;

        tracing::info!(
            result_code = result.result_code,
            description = %result.result_description,
            "Payment failed"
        );
        Ok(ReconcileOutcome::Failed)
    }

    async fn finish_transaction(
        &self,
        transaction: &ProviderTransaction,
        to: ProviderTransactionStatus,
        result: &CallbackResult,
    ) -> Result<(), PaymentError> {
        let moved = self
            .transactions
            .transition_status(
                &transaction.id,
                to,
                &result.result_code.to_string(),
                &result.result_description,
            )
            .await?;
        if !moved {
            tracing::warn!(
                status = %transaction.status,
                target = %to,
                "Provider transaction already final"
            );
        }
        Ok(())
    }

    async fn enqueue_notify(&self, payment: &Payment) -> Result<(), PaymentError> {
        self.outbox
            .enqueue(
                PaymentJob::Notify {
                    payment_id: payment.id,
                },
                self.notification_max_attempts,
            )
            .await?;
        Ok(())
    }
}
