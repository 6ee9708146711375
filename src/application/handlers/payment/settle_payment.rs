//! SettlePaymentHandler - Applies a completed payment to the partner ledger.
//!
//! The `(payment_id, kind)` settlement claim is taken before the partner is
//! called, so a payment is credited or debited at most once no matter how
//! many settle jobs run for it. A failed settlement is not retried; the
//! payment stays `completed` with the error recorded for manual review.

use std::sync::Arc;

use crate::domain::foundation::PaymentId;
use crate::domain::payment::{
    ErrorContext, PaymentError, PaymentStatus, SettlementKind, SettlementRecord, SettlementStatus,
};
use crate::ports::{
    ClaimResult, LedgerRequest, PartnerLedger, PaymentRepository, SettlementRepository,
};

/// What a settle attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
    Settled { ledger_reference: Option<String> },
    /// The payment is not completed.
    NotCompleted { status: PaymentStatus },
    /// Another run holds or finished the claim.
    AlreadyClaimed { status: SettlementStatus },
}

/// Handler for `SettlePayment`.
pub struct SettlePaymentHandler {
    payments: Arc<dyn PaymentRepository>,
    settlements: Arc<dyn SettlementRepository>,
    ledger: Arc<dyn PartnerLedger>,
}

impl SettlePaymentHandler {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        settlements: Arc<dyn SettlementRepository>,
        ledger: Arc<dyn PartnerLedger>,
    ) -> Self {
        Self {
            payments,
            settlements,
            ledger,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn handle(&self, payment_id: PaymentId) -> Result<SettleOutcome, PaymentError> {
        let payment = self
            .payments
            .find_by_id(&payment_id)
            .await?
            .ok_or_else(|| PaymentError::not_found(ErrorContext::for_ref(payment_id.to_string())))?;

        if payment.status != PaymentStatus::Completed {
            tracing::debug!(
                payment_ref = %payment.payment_ref,
                status = %payment.status,
                "Payment not completed, nothing to settle"
            );
            return Ok(SettleOutcome::NotCompleted {
                status: payment.status,
            });
        }

        let kind = payment.settlement_kind();
        let claim = SettlementRecord::claim(payment.id, kind);
        if let ClaimResult::AlreadyClaimed(status) = self.settlements.claim(&claim).await? {
            tracing::info!(
                payment_ref = %payment.payment_ref,
                kind = %kind,
                status = %status,
                "Settlement already claimed, skipping"
            );
            return Ok(SettleOutcome::AlreadyClaimed { status });
        }

        // Ledger amount, never the provider's local amount
        let request = LedgerRequest {
            user_id: payment.user_id.to_string(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            transaction_ref: payment.partner_tx_ref.clone(),
            external_ref: payment.external_ref().to_string(),
            metadata: payment.metadata.clone(),
        };

        let result = match kind {
            SettlementKind::Credit => self.ledger.credit_user(&payment.partner_id, &request).await,
            SettlementKind::Debit => self.ledger.debit_user(&payment.partner_id, &request).await,
        };

        match result {
            Ok(receipt) => {
                self.settlements
                    .mark_settled(&payment.id, kind, receipt.reference.as_deref())
                    .await?;
                tracing::info!(
                    payment_ref = %payment.payment_ref,
                    partner_id = %payment.partner_id,
                    kind = %kind,
                    external_ref = %request.external_ref,
                    "Payment settled on partner ledger"
                );
                Ok(SettleOutcome::Settled {
                    ledger_reference: receipt.reference,
                })
            }
            Err(e) => {
                let reason = format!("{} failed: {}", kind, e);
                tracing::error!(
                    payment_ref = %payment.payment_ref,
                    partner_id = %payment.partner_id,
                    error = %e,
                    "Settlement failed, manual review required"
                );
                self.payments.set_error(&payment.id, &reason).await?;
                self.settlements.mark_failed(&payment.id, kind, &reason).await?;
                Err(PaymentError::Settlement {
                    reason,
                    context: payment.context(),
                })
            }
        }
    }
}
