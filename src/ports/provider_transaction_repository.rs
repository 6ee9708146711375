//! Provider transaction repository port.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PaymentId, ProviderTransactionId};
use crate::domain::payment::{ProviderTransaction, ProviderTransactionStatus};

/// Repository port for provider-side transaction records.
///
/// Implementations must index every correlation column
/// (`checkout_request_id`, `provider_tx_id`, `originator_conversation_id`).
#[async_trait]
pub trait ProviderTransactionRepository: Send + Sync {
    async fn insert(&self, transaction: &ProviderTransaction) -> Result<(), DomainError>;

    /// Find the transaction whose checkout request ID or provider
    /// transaction ID equals `key`.
    async fn find_by_correlation_key(
        &self,
        key: &str,
    ) -> Result<Option<ProviderTransaction>, DomainError>;

    async fn find_by_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Vec<ProviderTransaction>, DomainError>;

    /// Compare-and-set status change recording the provider's result.
    ///
    /// Returns `false` if the stored status cannot move to `to`.
    async fn transition_status(
        &self,
        id: &ProviderTransactionId,
        to: ProviderTransactionStatus,
        result_code: &str,
        result_description: &str,
    ) -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_transaction_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn ProviderTransactionRepository) {}
    }
}
