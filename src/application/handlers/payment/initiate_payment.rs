//! InitiatePaymentHandler - Intake of partner deposit and withdrawal requests.
//!
//! The request is validated and stored as a pending payment; the provider is
//! called later by the worker pool, so the partner never waits on provider
//! latency.

use std::sync::Arc;

use crate::domain::foundation::ValidationError;
use crate::domain::payment::{
    ErrorContext, NewPayment, Payment, PaymentError, PaymentJob, PaymentType,
};
use crate::ports::{CreateOutcome, JobOutbox, PaymentRepository};

use super::ProviderRegistry;

/// Provider dispatch runs once; a lost dispatch is picked up by the sweeper.
pub const DISPATCH_MAX_ATTEMPTS: u32 = 1;

/// Command to initiate a deposit or withdrawal.
#[derive(Debug, Clone)]
pub struct InitiatePaymentCommand {
    pub request: NewPayment,
}

impl InitiatePaymentCommand {
    pub fn deposit(mut request: NewPayment) -> Self {
        request.payment_type = PaymentType::Deposit;
        Self { request }
    }

    pub fn withdrawal(mut request: NewPayment) -> Self {
        request.payment_type = PaymentType::Withdrawal;
        Self { request }
    }
}

/// Result of intake.
#[derive(Debug, Clone)]
pub struct InitiatePaymentResult {
    pub payment: Payment,
    /// True when the partner ref was already known and the stored payment
    /// was returned unchanged.
    pub replayed: bool,
}

/// Handler for `InitiateDeposit` / `InitiateWithdrawal`.
pub struct InitiatePaymentHandler {
    payments: Arc<dyn PaymentRepository>,
    outbox: Arc<dyn JobOutbox>,
    providers: ProviderRegistry,
}

impl InitiatePaymentHandler {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        outbox: Arc<dyn JobOutbox>,
        providers: ProviderRegistry,
    ) -> Self {
        Self {
            payments,
            outbox,
            providers,
        }
    }

    #[tracing::instrument(
        skip(self, cmd),
        fields(
            payment_ref = %cmd.request.transaction_ref,
            partner_id = %cmd.request.partner_id,
            provider = %cmd.request.provider,
            payment_type = %cmd.request.payment_type,
        )
    )]
    pub async fn handle(
        &self,
        cmd: InitiatePaymentCommand,
    ) -> Result<InitiatePaymentResult, PaymentError> {
        let request = cmd.request;
        let context = ErrorContext::new(
            request.transaction_ref.trim(),
            request.partner_id.trim(),
            request.provider,
        );

        // 1. Validate before anything is stored
        let provider = request.provider;
        let payment =
            Payment::create(request).map_err(|e| PaymentError::validation(e, context.clone()))?;

        // 2. Providers without an adapter are refused synchronously
        if !self.providers.supports(provider) {
            tracing::warn!("Rejected payment for unsupported provider");
            return Err(PaymentError::UnsupportedProvider { provider, context });
        }

        // 3. Idempotency by (partner_id, transaction_ref)
        if let Some(existing) = self
            .payments
            .find_by_partner_ref(&payment.partner_id, &payment.partner_tx_ref)
            .await?
        {
            tracing::info!(status = %existing.status, "Replayed payment request");
            return Ok(InitiatePaymentResult {
                payment: existing,
                replayed: true,
            });
        }

        // 4. Persist; a concurrent insert for the same ref loses here
        match self.payments.create(&payment).await? {
            CreateOutcome::Created => {}
            CreateOutcome::Existing(existing) if existing.partner_id == payment.partner_id => {
                tracing::info!(status = %existing.status, "Replayed payment request");
                return Ok(InitiatePaymentResult {
                    payment: *existing,
                    replayed: true,
                });
            }
            CreateOutcome::Existing(_) => {
                return Err(PaymentError::validation(
                    ValidationError::invalid_format(
                        "transaction_ref",
                        "already used by another partner",
                    ),
                    context,
                ));
            }
        }

        // 5. Hand off to the worker pool
        let job = PaymentJob::Dispatch {
            payment_id: payment.id,
        };
        if let Err(e) = self.outbox.enqueue(job, DISPATCH_MAX_ATTEMPTS).await {
            // Payment stays pending and is re-dispatched by the recovery sweep.
            tracing::error!(error = %e, "Failed to enqueue dispatch job");
        }

        tracing::info!(payment_id = %payment.id, "Payment accepted");
        Ok(InitiatePaymentResult {
            payment,
            replayed: false,
        })
    }
}
