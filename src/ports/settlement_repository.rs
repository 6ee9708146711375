//! Settlement repository port - at-most-once settlement per payment.
//!
//! Implementations should use a database constraint (UNIQUE on
//! `payment_id, kind`) so that two concurrent claims cannot both succeed.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PaymentId};
use crate::domain::payment::{SettlementKind, SettlementRecord, SettlementStatus};

/// Result of claiming a settlement key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimResult {
    /// This caller owns the settlement and must call the ledger.
    Claimed,
    /// Someone claimed it before; carries that record's status.
    AlreadyClaimed(SettlementStatus),
}

#[async_trait]
pub trait SettlementRepository: Send + Sync {
    /// Insert the record unless `(payment_id, kind)` already exists.
    async fn claim(&self, record: &SettlementRecord) -> Result<ClaimResult, DomainError>;

    async fn mark_settled(
        &self,
        payment_id: &PaymentId,
        kind: SettlementKind,
        ledger_reference: Option<&str>,
    ) -> Result<(), DomainError>;

    async fn mark_failed(
        &self,
        payment_id: &PaymentId,
        kind: SettlementKind,
        error: &str,
    ) -> Result<(), DomainError>;

    async fn find(
        &self,
        payment_id: &PaymentId,
        kind: SettlementKind,
    ) -> Result<Option<SettlementRecord>, DomainError>;
}
