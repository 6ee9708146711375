//! One attempt at the provider API for a payment.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::{
    PaymentId, ProviderTransactionId, StateMachine, Timestamp, ValidationError,
};

use super::{Provider, ProviderTransactionStatus, TransactionType};

/// Provider-side record of a dispatched payment.
///
/// # Invariants
///
/// - A `sent` transaction carries a correlation key
/// - `payment_id` never changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderTransaction {
    pub id: ProviderTransactionId,
    pub payment_id: PaymentId,
    pub provider: Provider,
    pub transaction_type: TransactionType,
    pub request_payload: Value,
    pub response_payload: Option<Value>,

    /// Conversation ID (B2C/B2B) or merchant request ID (STK).
    pub provider_tx_id: Option<String>,

    /// STK checkout request ID.
    pub checkout_request_id: Option<String>,

    /// Originator conversation ID (B2C/B2B). Some result callbacks carry
    /// only this one.
    pub originator_conversation_id: Option<String>,

    pub status: ProviderTransactionStatus,
    pub result_code: Option<String>,
    pub result_description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ProviderTransaction {
    pub fn new(
        payment_id: PaymentId,
        provider: Provider,
        transaction_type: TransactionType,
        request_payload: Value,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: ProviderTransactionId::new(),
            payment_id,
            provider,
            transaction_type,
            request_payload,
            response_payload: None,
            provider_tx_id: None,
            checkout_request_id: None,
            originator_conversation_id: None,
            status: ProviderTransactionStatus::Initiated,
            result_code: None,
            result_description: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Key a callback must carry to be matched to this transaction.
    pub fn correlation_key(&self) -> Option<&str> {
        self.checkout_request_id
            .as_deref()
            .or(self.provider_tx_id.as_deref())
    }

    pub fn matches(&self, key: &str) -> bool {
        [
            &self.checkout_request_id,
            &self.provider_tx_id,
            &self.originator_conversation_id,
        ]
        .into_iter()
        .any(|id| id.as_deref() == Some(key))
    }

    /// Records the provider's acceptance of the request.
    pub fn mark_sent(
        &mut self,
        response_payload: Value,
        provider_tx_id: Option<String>,
        checkout_request_id: Option<String>,
        result_code: impl Into<String>,
        result_description: impl Into<String>,
    ) -> Result<(), ValidationError> {
        self.transition(ProviderTransactionStatus::Sent)?;
        self.response_payload = Some(response_payload);
        self.provider_tx_id = provider_tx_id;
        self.checkout_request_id = checkout_request_id;
        self.result_code = Some(result_code.into());
        self.result_description = Some(result_description.into());
        Ok(())
    }

    /// Records a synchronous rejection or a failed final result.
    pub fn mark_failed(
        &mut self,
        result_code: impl Into<String>,
        result_description: impl Into<String>,
    ) -> Result<(), ValidationError> {
        self.transition(ProviderTransactionStatus::Failed)?;
        self.result_code = Some(result_code.into());
        self.result_description = Some(result_description.into());
        Ok(())
    }

    pub fn complete(
        &mut self,
        result_code: impl Into<String>,
        result_description: impl Into<String>,
    ) -> Result<(), ValidationError> {
        self.transition(ProviderTransactionStatus::Completed)?;
        self.result_code = Some(result_code.into());
        self.result_description = Some(result_description.into());
        Ok(())
    }

    fn transition(&mut self, target: ProviderTransactionStatus) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(target)?;
        self.updated_at = Timestamp::now();
        Ok(())
    }
}
