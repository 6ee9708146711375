//! DispatchPaymentHandler - Sends a pending payment to its provider.
//!
//! Runs from the worker pool. The payment is moved to `processing` before
//! the provider is called, so a replayed job never dispatches twice.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::domain::foundation::PaymentId;
use crate::domain::payment::{
    CallbackFlow, CallbackUrls, ErrorContext, Payment, PaymentError, PaymentJob, PaymentStatus,
    ProviderTransaction, TransactionType,
};
use crate::ports::{
    B2bRequest, B2cRequest, JobOutbox, MobileMoneyProvider, PaymentRepository, ProviderAck,
    ProviderTransactionRepository, StkPushRequest,
};

use super::ProviderRegistry;

/// What a dispatch attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The provider queued the request; callbacks will carry this key.
    Sent { correlation_key: Option<String> },
    /// The payment was no longer pending.
    Skipped { status: PaymentStatus },
}

/// Handler for `DispatchPayment`.
pub struct DispatchPaymentHandler {
    payments: Arc<dyn PaymentRepository>,
    transactions: Arc<dyn ProviderTransactionRepository>,
    outbox: Arc<dyn JobOutbox>,
    providers: ProviderRegistry,
    callback_urls: CallbackUrls,
    notification_max_attempts: u32,
}

impl DispatchPaymentHandler {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        transactions: Arc<dyn ProviderTransactionRepository>,
        outbox: Arc<dyn JobOutbox>,
        providers: ProviderRegistry,
        callback_urls: CallbackUrls,
        notification_max_attempts: u32,
    ) -> Self {
        Self {
            payments,
            transactions,
            outbox,
            providers,
            callback_urls,
            notification_max_attempts,
        }
    }

    #[tracing::instrument(
        skip(self),
        fields(payment_ref = tracing::field::Empty, provider = tracing::field::Empty)
    )]
    pub async fn handle(&self, payment_id: PaymentId) -> Result<DispatchOutcome, PaymentError> {
        // 1. Only pending payments are dispatched
        let payment = self
            .payments
            .find_by_id(&payment_id)
            .await?
            .ok_or_else(|| PaymentError::not_found(ErrorContext::for_ref(payment_id.to_string())))?;
        let span = tracing::Span::current();
        span.record("payment_ref", payment.payment_ref.as_str());
        span.record("provider", payment.provider.as_str());

        if payment.status != PaymentStatus::Pending {
            tracing::debug!(status = %payment.status, "Payment no longer pending, skipping dispatch");
            return Ok(DispatchOutcome::Skipped {
                status: payment.status,
            });
        }
        let context = payment.context();

        let Some(adapter) = self.providers.get(payment.provider) else {
            self.fail(&payment, "no adapter registered for provider").await?;
            return Err(PaymentError::UnsupportedProvider {
                provider: payment.provider,
                context,
            });
        };

        // 2. Provider is paid in the original local currency
        let local = payment.local_amount();
        if local.degraded {
            tracing::warn!(
                ledger_amount = %payment.amount,
                currency = %payment.currency,
                "Metadata has no original amount, sending ledger amount to provider"
            );
        }

        // 3. Claim the payment before calling out
        if !self
            .payments
            .transition_status(&payment.id, PaymentStatus::Processing)
            .await?
        {
            tracing::info!("Payment claimed by another dispatch, skipping");
            return Ok(DispatchOutcome::Skipped {
                status: PaymentStatus::Processing,
            });
        }

        // 4-5. Route and call the provider
        let transaction_type = payment.transaction_type();
        let ack = match self
            .call_provider(adapter.as_ref(), &payment, transaction_type, local.amount)
            .await
        {
            Ok(ack) => ack,
            Err(reason) => {
                // 6. Transport failure: no provider transaction exists
                tracing::error!(error = %reason, "Provider dispatch failed");
                self.fail(&payment, &format!("provider dispatch failed: {}", reason))
                    .await?;
                return Err(PaymentError::DispatchFailed { reason, context });
            }
        };

        // 7. Record the provider's answer
        let mut transaction = ProviderTransaction::new(
            payment.id,
            payment.provider,
            transaction_type,
            ack.request_payload.clone(),
        );

        if ack.accepted {
            transaction
                .mark_sent(
                    ack.response_payload,
                    ack.provider_tx_id,
                    ack.checkout_request_id,
                    ack.response_code,
                    ack.response_description,
                )
                .map_err(|e| PaymentError::validation(e, context.clone()))?;
            transaction.originator_conversation_id = ack.originator_conversation_id;
            self.transactions.insert(&transaction).await?;

            let correlation_key = transaction.correlation_key().map(str::to_string);
            if correlation_key.is_none() {
                tracing::warn!("Provider accepted request without a correlation key");
            }
            tracing::info!(
                correlation_key = correlation_key.as_deref().unwrap_or("-"),
                transaction_type = %transaction_type,
                "Payment sent to provider"
            );
            return Ok(DispatchOutcome::Sent { correlation_key });
        }

        transaction
            .mark_failed(&ack.response_code, &ack.response_description)
            .map_err(|e| PaymentError::validation(e, context.clone()))?;
        self.transactions.insert(&transaction).await?;
        tracing::warn!(
            result_code = %ack.response_code,
            description = %ack.response_description,
            "Provider rejected payment"
        );
        self.fail(&payment, &ack.response_description).await?;

        Err(PaymentError::ProviderRejected {
            code: ack.response_code,
            description: ack.response_description,
            context,
        })
    }

    async fn call_provider(
        &self,
        adapter: &dyn MobileMoneyProvider,
        payment: &Payment,
        transaction_type: TransactionType,
        amount: Decimal,
    ) -> Result<ProviderAck, String> {
        let payment_ref = payment.payment_ref.as_str();
        let flow = CallbackFlow::for_transaction(transaction_type);
        let result_url = self.callback_urls.result_url(flow, payment_ref);
        let phone_number = payment.phone_number.clone().unwrap_or_default();

        let result = match transaction_type {
            TransactionType::StkPush => {
                adapter
                    .stk_push(&StkPushRequest {
                        amount,
                        phone_number,
                        account_reference: payment_ref.to_string(),
                        description: format!("Deposit {}", payment_ref),
                        callback_url: result_url,
                    })
                    .await
            }
            TransactionType::B2c => {
                adapter
                    .b2c_payment(&B2cRequest {
                        amount,
                        phone_number,
                        remarks: format!("Withdrawal {}", payment_ref),
                        occasion: payment_ref.to_string(),
                        result_url,
                        queue_timeout_url: self.callback_urls.timeout_url(payment_ref),
                    })
                    .await
            }
            TransactionType::B2b => {
                adapter
                    .b2b_payment(&B2bRequest {
                        amount,
                        receiver_shortcode: payment.account_number.clone().unwrap_or_default(),
                        account_reference: payment_ref.to_string(),
                        requester: payment.phone_number.clone(),
                        remarks: format!("Withdrawal {}", payment_ref),
                        result_url,
                        queue_timeout_url: self.callback_urls.timeout_url(payment_ref),
                    })
                    .await
            }
        };

        result.map_err(|e| e.to_string())
    }

    /// Fail the payment and tell the partner.
    async fn fail(&self, payment: &Payment, reason: &str) -> Result<(), PaymentError> {
        if self.payments.fail_with_error(&payment.id, reason).await? {
            let job = PaymentJob::Notify {
                payment_id: payment.id,
            };
            self.outbox
                .enqueue(job, self.notification_max_attempts)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryJobOutbox, InMemoryPaymentStore};
    use crate::adapters::mpesa::{MockMobileMoneyProvider, ProviderCall};
    use crate::domain::payment::test_support::pending_deposit;
    use crate::domain::payment::{PaymentType, ProviderTransactionStatus};
    use crate::ports::{JobStatus, ProviderError};
    use rust_decimal_macros::dec;
    use secrecy::SecretString;
    use serde_json::json;

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    struct Fixture {
        store: Arc<InMemoryPaymentStore>,
        outbox: Arc<InMemoryJobOutbox>,
        provider: MockMobileMoneyProvider,
        handler: DispatchPaymentHandler,
    }

    fn fixture_with(urls: CallbackUrls) -> Fixture {
        let store = Arc::new(InMemoryPaymentStore::new());
        let outbox = Arc::new(InMemoryJobOutbox::new());
        let provider = MockMobileMoneyProvider::new();
        let handler = DispatchPaymentHandler::new(
            store.clone(),
            store.clone(),
            outbox.clone(),
            ProviderRegistry::new().with(Arc::new(provider.clone())),
            urls,
            5,
        );
        Fixture {
            store,
            outbox,
            provider,
            handler,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(CallbackUrls::new("https://bridge.test", None))
    }

    async fn stored(f: &Fixture, payment: Payment) -> Payment {
        f.store.put_payment(payment.clone()).await;
        payment
    }

    async fn reload(f: &Fixture, id: &PaymentId) -> Payment {
        f.store.find_by_id(id).await.unwrap().unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Routing and Amounts
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn deposit_goes_out_as_stk_push_with_local_amount() {
        let f = fixture();
        let payment = stored(&f, pending_deposit()).await;

        let outcome = f.handler.handle(payment.id).await.unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Sent {
                correlation_key: Some("ws_1".to_string())
            }
        );
        let calls = f.provider.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            ProviderCall::StkPush(request) => {
                assert_eq!(request.amount, dec!(1300));
                assert_eq!(request.phone_number, "254712345678");
                assert_eq!(
                    request.callback_url,
                    "https://bridge.test/callbacks/mpesa/stk/TX1"
                );
            }
            other => panic!("expected STK push, got {:?}", other),
        }
        assert_eq!(reload(&f, &payment.id).await.status, PaymentStatus::Processing);

        let transactions = f.store.transactions().await;
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].status, ProviderTransactionStatus::Sent);
        assert_eq!(transactions[0].correlation_key(), Some("ws_1"));
    }

    #[tokio::test]
    async fn withdrawal_to_business_account_goes_out_as_b2b() {
        let f = fixture();
        let mut payment = pending_deposit();
        payment.payment_type = PaymentType::Withdrawal;
        payment.account_number = Some("600000".to_string());
        let payment = stored(&f, payment).await;

        f.handler.handle(payment.id).await.unwrap();

        match &f.provider.calls()[0] {
            ProviderCall::B2b(request) => {
                assert_eq!(request.receiver_shortcode, "600000");
                assert_eq!(
                    request.queue_timeout_url,
                    "https://bridge.test/callbacks/mpesa/timeout/TX1"
                );
            }
            other => panic!("expected B2B, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn withdrawal_to_phone_goes_out_as_b2c() {
        let f = fixture();
        let mut payment = pending_deposit();
        payment.payment_type = PaymentType::Withdrawal;
        let payment = stored(&f, payment).await;

        f.handler.handle(payment.id).await.unwrap();

        assert!(matches!(f.provider.calls()[0], ProviderCall::B2c(_)));
    }

    #[tokio::test]
    async fn missing_original_amount_falls_back_to_ledger_amount() {
        let f = fixture();
        let mut payment = pending_deposit();
        payment.metadata = json!({});
        let payment = stored(&f, payment).await;

        f.handler.handle(payment.id).await.unwrap();

        assert_eq!(f.provider.calls()[0].amount(), dec!(10));
    }

    #[tokio::test]
    async fn signed_callback_url_carries_token() {
        let urls = CallbackUrls::new(
            "https://bridge.test",
            Some(SecretString::new("cb-secret".to_string())),
        );
        let token = urls.token_for("TX1").unwrap();
        let f = fixture_with(urls);
        let payment = stored(&f, pending_deposit()).await;

        f.handler.handle(payment.id).await.unwrap();

        match &f.provider.calls()[0] {
            ProviderCall::StkPush(request) => {
                assert!(request.callback_url.ends_with(&format!("?token={}", token)));
            }
            other => panic!("expected STK push, got {:?}", other),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Replay Safety
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn non_pending_payment_is_skipped() {
        let f = fixture();
        let payment = stored(&f, pending_deposit()).await;
        f.handler.handle(payment.id).await.unwrap();

        let again = f.handler.handle(payment.id).await.unwrap();

        assert_eq!(
            again,
            DispatchOutcome::Skipped {
                status: PaymentStatus::Processing
            }
        );
        assert_eq!(f.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn unknown_payment_is_not_found() {
        let f = fixture();

        let err = f.handler.handle(PaymentId::new()).await.unwrap_err();

        assert_eq!(err.code(), "PAYMENT_NOT_FOUND");
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failures
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn transport_failure_fails_payment_without_provider_transaction() {
        let f = fixture();
        let payment = stored(&f, pending_deposit()).await;
        f.provider.fail_next(ProviderError::timeout("no response in 30s"));

        let err = f.handler.handle(payment.id).await.unwrap_err();

        assert_eq!(err.code(), "PROVIDER_DISPATCH_FAILED");
        let failed = reload(&f, &payment.id).await;
        assert_eq!(failed.status, PaymentStatus::Failed);
        assert!(failed
            .error_message
            .unwrap()
            .starts_with("provider dispatch failed"));
        assert!(f.store.transactions().await.is_empty());
        assert_eq!(
            f.outbox.jobs_with_status(JobStatus::Pending).await,
            vec![PaymentJob::Notify {
                payment_id: payment.id
            }]
        );
    }

    #[tokio::test]
    async fn rejection_fails_both_rows_with_provider_reason() {
        let f = fixture();
        let payment = stored(&f, pending_deposit()).await;
        f.provider.reject_next("400.002.02", "Bad Request - Invalid PhoneNumber");

        let err = f.handler.handle(payment.id).await.unwrap_err();

        assert_eq!(err.code(), "PROVIDER_REJECTED");
        let failed = reload(&f, &payment.id).await;
        assert_eq!(failed.status, PaymentStatus::Failed);
        assert_eq!(
            failed.error_message.as_deref(),
            Some("Bad Request - Invalid PhoneNumber")
        );
        let transactions = f.store.transactions().await;
        assert_eq!(transactions[0].status, ProviderTransactionStatus::Failed);
        assert_eq!(transactions[0].result_code.as_deref(), Some("400.002.02"));
    }
}
