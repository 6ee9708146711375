//! In-memory partner ledger and notifier that record every call.
//!
//! Used by tests and by local runs without partner endpoints.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::foundation::PartnerId;
use crate::domain::payment::SettlementKind;
use crate::ports::{
    LedgerReceipt, LedgerRequest, PartnerError, PartnerLedger, PartnerNotifier, StatusNotification,
};

/// One recorded ledger movement.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerCall {
    pub partner_id: PartnerId,
    pub kind: SettlementKind,
    pub request: LedgerRequest,
}

#[derive(Default)]
struct LedgerState {
    calls: Vec<LedgerCall>,
    failures: VecDeque<PartnerError>,
}

/// Recording ledger; succeeds unless failures are queued.
#[derive(Clone, Default)]
pub struct RecordingPartnerLedger {
    inner: Arc<Mutex<LedgerState>>,
}

impl RecordingPartnerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an error for the next call.
    pub fn fail_next(&self, error: PartnerError) {
        self.state().failures.push_back(error);
    }

    pub fn calls(&self) -> Vec<LedgerCall> {
        self.state().calls.clone()
    }

    fn record(
        &self,
        partner_id: &PartnerId,
        kind: SettlementKind,
        request: &LedgerRequest,
    ) -> Result<LedgerReceipt, PartnerError> {
        let mut state = self.state();
        state.calls.push(LedgerCall {
            partner_id: partner_id.clone(),
            kind,
            request: request.clone(),
        });
        match state.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(LedgerReceipt {
                reference: Some(format!("ledger-{}", state.calls.len())),
            }),
        }
    }
}

#[async_trait]
impl PartnerLedger for RecordingPartnerLedger {
    async fn credit_user(
        &self,
        partner_id: &PartnerId,
        request: &LedgerRequest,
    ) -> Result<LedgerReceipt, PartnerError> {
        self.record(partner_id, SettlementKind::Credit, request)
    }

    async fn debit_user(
        &self,
        partner_id: &PartnerId,
        request: &LedgerRequest,
    ) -> Result<LedgerReceipt, PartnerError> {
        self.record(partner_id, SettlementKind::Debit, request)
    }
}

#[derive(Default)]
struct NotifierState {
    delivered: Vec<(PartnerId, StatusNotification)>,
    attempts: usize,
    failures: VecDeque<PartnerError>,
}

/// Recording notifier; succeeds unless failures are queued.
#[derive(Clone, Default)]
pub struct RecordingPartnerNotifier {
    inner: Arc<Mutex<NotifierState>>,
}

impl RecordingPartnerNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, NotifierState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_next(&self, error: PartnerError) {
        self.state().failures.push_back(error);
    }

    /// Successfully delivered notifications.
    pub fn delivered(&self) -> Vec<(PartnerId, StatusNotification)> {
        self.state().delivered.clone()
    }

    /// Delivery attempts, including failed ones.
    pub fn attempts(&self) -> usize {
        self.state().attempts
    }
}

#[async_trait]
impl PartnerNotifier for RecordingPartnerNotifier {
    async fn notify(
        &self,
        partner_id: &PartnerId,
        notification: &StatusNotification,
    ) -> Result<(), PartnerError> {
        let mut state = self.state();
        state.attempts += 1;
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }
        state
            .delivered
            .push((partner_id.clone(), notification.clone()));
        Ok(())
    }
}
