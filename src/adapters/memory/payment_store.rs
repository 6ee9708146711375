//! In-memory payment store.
//!
//! One store implements all three persistence ports so that cross-table
//! queries (`find_unsettled`) see a consistent view. Used by tests and by
//! local runs without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::domain::foundation::{
    DomainError, ErrorCode, PartnerId, PaymentId, ProviderTransactionId, StateMachine, Timestamp,
};
use crate::domain::payment::{
    Payment, PaymentStatus, ProviderTransaction, ProviderTransactionStatus, SettlementKind,
    SettlementRecord,
};
use crate::ports::{
    ClaimResult, CreateOutcome, PaymentRepository, ProviderTransactionRepository,
    SettlementRepository,
};

#[derive(Default)]
struct StoreState {
    payments: HashMap<PaymentId, Payment>,
    transactions: HashMap<ProviderTransactionId, ProviderTransaction>,
    settlements: HashMap<(PaymentId, SettlementKind), SettlementRecord>,
}

impl StoreState {
    fn payment_mut(&mut self, id: &PaymentId) -> Result<&mut Payment, DomainError> {
        self.payments.get_mut(id).ok_or_else(|| payment_not_found(id))
    }
}

fn payment_not_found(id: &PaymentId) -> DomainError {
    DomainError::new(ErrorCode::PaymentNotFound, format!("payment {} not found", id))
}

/// In-memory implementation of the payment, provider transaction and
/// settlement repositories.
#[derive(Default)]
pub struct InMemoryPaymentStore {
    state: RwLock<StoreState>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    pub async fn payment_count(&self) -> usize {
        self.state.read().await.payments.len()
    }

    pub async fn transactions(&self) -> Vec<ProviderTransaction> {
        self.state.read().await.transactions.values().cloned().collect()
    }

    pub async fn settlements(&self) -> Vec<SettlementRecord> {
        self.state.read().await.settlements.values().cloned().collect()
    }

    /// Overwrite a stored payment, bypassing status checks.
    pub async fn put_payment(&self, payment: Payment) {
        self.state.write().await.payments.insert(payment.id, payment);
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentStore {
    async fn create(&self, payment: &Payment) -> Result<CreateOutcome, DomainError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .payments
            .values()
            .find(|p| p.payment_ref == payment.payment_ref)
        {
            return Ok(CreateOutcome::Existing(Box::new(existing.clone())));
        }
        state.payments.insert(payment.id, payment.clone());
        Ok(CreateOutcome::Created)
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError> {
        Ok(self.state.read().await.payments.get(id).cloned())
    }

    async fn find_by_ref(&self, payment_ref: &str) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .state
            .read()
            .await
            .payments
            .values()
            .find(|p| p.payment_ref == payment_ref)
            .cloned())
    }

    async fn find_by_partner_ref(
        &self,
        partner_id: &PartnerId,
        partner_tx_ref: &str,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .state
            .read()
            .await
            .payments
            .values()
            .find(|p| &p.partner_id == partner_id && p.partner_tx_ref == partner_tx_ref)
            .cloned())
    }

    async fn transition_status(
        &self,
        id: &PaymentId,
        to: PaymentStatus,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        let payment = state.payment_mut(id)?;
        if !payment.status.can_transition_to(&to) {
            return Ok(false);
        }
        payment.status = to;
        payment.updated_at = Timestamp::now();
        Ok(true)
    }

    async fn set_error(&self, id: &PaymentId, message: &str) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        Ok(state.payment_mut(id)?.set_error(message))
    }

    async fn fail_with_error(&self, id: &PaymentId, message: &str) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        let payment = state.payment_mut(id)?;
        if !payment.status.can_transition_to(&PaymentStatus::Failed) {
            return Ok(false);
        }
        Ok(payment.set_error(message))
    }

    async fn record_callback(
        &self,
        id: &PaymentId,
        payload: &Value,
        provider_reference: Option<&str>,
    ) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        state
            .payment_mut(id)?
            .record_callback(payload.clone(), provider_reference.map(str::to_string));
        Ok(())
    }

    async fn mark_partner_notified(&self, id: &PaymentId) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        state.payment_mut(id)?.mark_partner_notified();
        Ok(())
    }

    async fn find_unsettled(&self, limit: u32) -> Result<Vec<Payment>, DomainError> {
        let state = self.state.read().await;
        let mut unsettled: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Completed)
            .filter(|p| {
                !state
                    .settlements
                    .contains_key(&(p.id, p.settlement_kind()))
            })
            .cloned()
            .collect();
        unsettled.sort_by_key(|p| p.updated_at);
        unsettled.truncate(limit as usize);
        Ok(unsettled)
    }

    async fn find_unnotified(
        &self,
        updated_before: Timestamp,
        limit: u32,
    ) -> Result<Vec<Payment>, DomainError> {
        let state = self.state.read().await;
        let mut unnotified: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.is_terminal() && !p.partner_notified)
            .filter(|p| p.updated_at.is_before(&updated_before))
            .cloned()
            .collect();
        unnotified.sort_by_key(|p| p.updated_at);
        unnotified.truncate(limit as usize);
        Ok(unnotified)
    }

    async fn find_stale_pending(
        &self,
        created_before: Timestamp,
        limit: u32,
    ) -> Result<Vec<Payment>, DomainError> {
        let state = self.state.read().await;
        let mut stale: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Pending)
            .filter(|p| p.created_at.is_before(&created_before))
            .cloned()
            .collect();
        stale.sort_by_key(|p| p.created_at);
        stale.truncate(limit as usize);
        Ok(stale)
    }
}

#[async_trait]
impl ProviderTransactionRepository for InMemoryPaymentStore {
    async fn insert(&self, transaction: &ProviderTransaction) -> Result<(), DomainError> {
        self.state
            .write()
            .await
            .transactions
            .insert(transaction.id, transaction.clone());
        Ok(())
    }

    async fn find_by_correlation_key(
        &self,
        key: &str,
    ) -> Result<Option<ProviderTransaction>, DomainError> {
        Ok(self
            .state
            .read()
            .await
            .transactions
            .values()
            .find(|t| t.matches(key))
            .cloned())
    }

    async fn find_by_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Vec<ProviderTransaction>, DomainError> {
        let state = self.state.read().await;
        let mut found: Vec<ProviderTransaction> = state
            .transactions
            .values()
            .filter(|t| &t.payment_id == payment_id)
            .cloned()
            .collect();
        found.sort_by_key(|t| t.created_at);
        Ok(found)
    }

    async fn transition_status(
        &self,
        id: &ProviderTransactionId,
        to: ProviderTransactionStatus,
        result_code: &str,
        result_description: &str,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        let transaction = state.transactions.get_mut(id).ok_or_else(|| {
            DomainError::new(
                ErrorCode::ProviderTransactionNotFound,
                format!("provider transaction {} not found", id),
            )
        })?;
        if !transaction.status.can_transition_to(&to) {
            return Ok(false);
        }
        transaction.status = to;
        transaction.result_code = Some(result_code.to_string());
        transaction.result_description = Some(result_description.to_string());
        transaction.updated_at = Timestamp::now();
        Ok(true)
    }
}

#[async_trait]
impl SettlementRepository for InMemoryPaymentStore {
    async fn claim(&self, record: &SettlementRecord) -> Result<ClaimResult, DomainError> {
        let mut state = self.state.write().await;
        let key = (record.payment_id, record.kind);
        if let Some(existing) = state.settlements.get(&key) {
            return Ok(ClaimResult::AlreadyClaimed(existing.status));
        }
        state.settlements.insert(key, record.clone());
        Ok(ClaimResult::Claimed)
    }

    async fn mark_settled(
        &self,
        payment_id: &PaymentId,
        kind: SettlementKind,
        ledger_reference: Option<&str>,
    ) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        if let Some(record) = state.settlements.get_mut(&(*payment_id, kind)) {
            record.mark_settled(ledger_reference.map(str::to_string));
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        payment_id: &PaymentId,
        kind: SettlementKind,
        error: &str,
    ) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        if let Some(record) = state.settlements.get_mut(&(*payment_id, kind)) {
            record.mark_failed(error);
        }
        Ok(())
    }

    async fn find(
        &self,
        payment_id: &PaymentId,
        kind: SettlementKind,
    ) -> Result<Option<SettlementRecord>, DomainError> {
        Ok(self
            .state
            .read()
            .await
            .settlements
            .get(&(*payment_id, kind))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::test_support::pending_deposit;
    use crate::domain::payment::{Provider, SettlementStatus, TransactionType};
    use serde_json::json;

    #[tokio::test]
    async fn create_is_idempotent_by_ref() {
        let store = InMemoryPaymentStore::new();
        let payment = pending_deposit();

        assert_eq!(store.create(&payment).await.unwrap(), CreateOutcome::Created);
        let again = store.create(&pending_deposit()).await.unwrap();

        match again {
            CreateOutcome::Existing(existing) => assert_eq!(existing.id, payment.id),
            other => panic!("expected existing row, got {:?}", other),
        }
        assert_eq!(store.payment_count().await, 1);
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let store = InMemoryPaymentStore::new();
        let payment = pending_deposit();
        store.create(&payment).await.unwrap();

        assert!(!PaymentRepository::transition_status(&store, &payment.id, PaymentStatus::Completed)
            .await
            .unwrap());
        assert!(PaymentRepository::transition_status(&store, &payment.id, PaymentStatus::Processing)
            .await
            .unwrap());
        assert!(PaymentRepository::transition_status(&store, &payment.id, PaymentStatus::Completed)
            .await
            .unwrap());
        assert!(!PaymentRepository::transition_status(&store, &payment.id, PaymentStatus::Failed)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn set_error_on_completed_payment_keeps_status() {
        let store = InMemoryPaymentStore::new();
        let mut payment = pending_deposit();
        payment.start_processing().unwrap();
        payment.complete().unwrap();
        store.create(&payment).await.unwrap();

        let failed = store.set_error(&payment.id, "credit failed: 503").await.unwrap();
        let stored = store.find_by_id(&payment.id).await.unwrap().unwrap();

        assert!(!failed);
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert_eq!(stored.error_message.as_deref(), Some("credit failed: 503"));
        assert_eq!(stored.retry_count, 1);
    }

    #[tokio::test]
    async fn fail_with_error_leaves_completed_payment_untouched() {
        let store = InMemoryPaymentStore::new();
        let mut payment = pending_deposit();
        payment.start_processing().unwrap();
        payment.complete().unwrap();
        store.create(&payment).await.unwrap();

        let failed = store
            .fail_with_error(&payment.id, "Request cancelled by user")
            .await
            .unwrap();
        let stored = store.find_by_id(&payment.id).await.unwrap().unwrap();

        assert!(!failed);
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert!(stored.error_message.is_none());
        assert_eq!(stored.retry_count, 0);
    }

    #[tokio::test]
    async fn correlation_key_matches_checkout_or_conversation_id() {
        let store = InMemoryPaymentStore::new();
        let mut stk = ProviderTransaction::new(
            PaymentId::new(),
            Provider::Mpesa,
            TransactionType::StkPush,
            json!({}),
        );
        stk.mark_sent(json!({}), Some("mr_1".into()), Some("ws_1".into()), "0", "ok")
            .unwrap();
        store.insert(&stk).await.unwrap();

        assert!(store.find_by_correlation_key("ws_1").await.unwrap().is_some());
        assert!(store.find_by_correlation_key("mr_1").await.unwrap().is_some());
        assert!(store.find_by_correlation_key("ws_9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn correlation_key_matches_originator_conversation_id() {
        let store = InMemoryPaymentStore::new();
        let mut b2b = ProviderTransaction::new(
            PaymentId::new(),
            Provider::Mpesa,
            TransactionType::B2b,
            json!({}),
        );
        b2b.mark_sent(json!({}), Some("AG_1".into()), None, "0", "ok")
            .unwrap();
        b2b.originator_conversation_id = Some("oc_1".into());
        store.insert(&b2b).await.unwrap();

        let found = store.find_by_correlation_key("oc_1").await.unwrap().unwrap();
        assert_eq!(found.id, b2b.id);
    }

    #[tokio::test]
    async fn second_settlement_claim_sees_the_first() {
        let store = InMemoryPaymentStore::new();
        let payment_id = PaymentId::new();
        let record = SettlementRecord::claim(payment_id, SettlementKind::Credit);

        assert_eq!(store.claim(&record).await.unwrap(), ClaimResult::Claimed);
        store
            .mark_settled(&payment_id, SettlementKind::Credit, Some("L-1"))
            .await
            .unwrap();

        let again = SettlementRecord::claim(payment_id, SettlementKind::Credit);
        assert_eq!(
            store.claim(&again).await.unwrap(),
            ClaimResult::AlreadyClaimed(SettlementStatus::Settled)
        );
    }

    #[tokio::test]
    async fn unsettled_lists_completed_payments_without_claim() {
        let store = InMemoryPaymentStore::new();
        let mut payment = pending_deposit();
        payment.start_processing().unwrap();
        payment.complete().unwrap();
        store.create(&payment).await.unwrap();

        assert_eq!(store.find_unsettled(10).await.unwrap().len(), 1);

        store
            .claim(&SettlementRecord::claim(payment.id, SettlementKind::Credit))
            .await
            .unwrap();
        assert!(store.find_unsettled(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_pending_respects_cutoff() {
        let store = InMemoryPaymentStore::new();
        let payment = pending_deposit();
        store.create(&payment).await.unwrap();

        let before_creation = payment.created_at.minus_secs(1);
        let after_creation = payment.created_at.plus_secs(1);

        assert!(store.find_stale_pending(before_creation, 10).await.unwrap().is_empty());
        assert_eq!(store.find_stale_pending(after_creation, 10).await.unwrap().len(), 1);
    }
}
