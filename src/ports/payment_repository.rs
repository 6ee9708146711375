//! Payment repository port.
//!
//! Durable storage for Payment rows. Status changes are compare-and-set:
//! an update only applies if the stored status can legally move to the
//! target, so concurrent or duplicated callers cannot regress a payment.
//!
//! # Design
//!
//! - **Idempotent create**: a second insert of the same ref returns the
//!   stored row instead of failing
//! - **No delete**: payments are never removed

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::foundation::{DomainError, PartnerId, PaymentId, Timestamp};
use crate::domain::payment::{Payment, PaymentStatus};

/// Result of [`PaymentRepository::create`].
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// The row was inserted.
    Created,
    /// A row with the same `payment_ref` already existed; it is returned
    /// unchanged.
    Existing(Box<Payment>),
}

/// Repository port for Payment persistence.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert a new payment unless its `payment_ref` is already taken.
    async fn create(&self, payment: &Payment) -> Result<CreateOutcome, DomainError>;

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError>;

    /// Lookup by the ref carried in callback URLs.
    async fn find_by_ref(&self, payment_ref: &str) -> Result<Option<Payment>, DomainError>;

    async fn find_by_partner_ref(
        &self,
        partner_id: &PartnerId,
        partner_tx_ref: &str,
    ) -> Result<Option<Payment>, DomainError>;

    /// Compare-and-set status change.
    ///
    /// Returns `false` without writing when the stored status cannot move
    /// to `to` (already terminal, or a concurrent writer got there first).
    async fn transition_status(
        &self,
        id: &PaymentId,
        to: PaymentStatus,
    ) -> Result<bool, DomainError>;

    /// Annotate the payment with an error and fail it if non-terminal.
    ///
    /// Increments `retry_count`. Returns `true` if the status moved to
    /// failed.
    async fn set_error(&self, id: &PaymentId, message: &str) -> Result<bool, DomainError>;

    /// Compare-and-set to failed, writing the error in the same step.
    ///
    /// Returns `false` without writing anything when the payment is already
    /// terminal.
    async fn fail_with_error(&self, id: &PaymentId, message: &str) -> Result<bool, DomainError>;

    /// Store the raw webhook body. `provider_reference` is only written if
    /// none is stored yet.
    async fn record_callback(
        &self,
        id: &PaymentId,
        payload: &Value,
        provider_reference: Option<&str>,
    ) -> Result<(), DomainError>;

    async fn mark_partner_notified(&self, id: &PaymentId) -> Result<(), DomainError>;

    /// Completed payments that have no settlement record yet.
    async fn find_unsettled(&self, limit: u32) -> Result<Vec<Payment>, DomainError>;

    /// Terminal payments the partner has not been told about, last updated
    /// before `updated_before`.
    async fn find_unnotified(
        &self,
        updated_before: Timestamp,
        limit: u32,
    ) -> Result<Vec<Payment>, DomainError>;

    /// Pending payments created before `created_before`.
    async fn find_stale_pending(
        &self,
        created_before: Timestamp,
        limit: u32,
    ) -> Result<Vec<Payment>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn PaymentRepository) {}
    }
}
