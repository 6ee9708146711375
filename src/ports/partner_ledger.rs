//! Partner ledger port.
//!
//! Partners keep the authoritative balance for their users. Once a payment
//! completes we credit (deposit) or debit (withdrawal) that balance through
//! the partner's API.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::foundation::PartnerId;

/// Balance movement sent to the partner.
///
/// `amount`/`currency` are the ledger amount, not the provider amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRequest {
    pub user_id: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency: String,
    pub transaction_ref: String,
    /// Provider receipt, or our payment ref when none was issued.
    pub external_ref: String,
    pub metadata: Value,
}

/// Partner's acknowledgement of a balance movement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    /// Partner-side reference, when returned.
    pub reference: Option<String>,
}

/// Errors talking to a partner's API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PartnerError {
    #[error("partner '{0}' is not configured")]
    UnknownPartner(String),

    #[error("partner '{partner_id}' has no {what} configured")]
    NotConfigured { partner_id: String, what: String },

    #[error("partner request failed: {0}")]
    Transport(String),

    #[error("partner responded {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl PartnerError {
    /// Transport failures and 5xx answers may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            PartnerError::Transport(_) => true,
            PartnerError::Rejected { status, .. } => *status >= 500 || *status == 429,
            PartnerError::UnknownPartner(_) | PartnerError::NotConfigured { .. } => false,
        }
    }
}

#[async_trait]
pub trait PartnerLedger: Send + Sync {
    async fn credit_user(
        &self,
        partner_id: &PartnerId,
        request: &LedgerRequest,
    ) -> Result<LedgerReceipt, PartnerError>;

    async fn debit_user(
        &self,
        partner_id: &PartnerId,
        request: &LedgerRequest,
    ) -> Result<LedgerReceipt, PartnerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partner_ledger_is_object_safe() {
        fn _accepts_dyn(_ledger: &dyn PartnerLedger) {}
    }

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        assert!(PartnerError::Transport("reset".into()).is_retryable());
        assert!(PartnerError::Rejected { status: 503, body: String::new() }.is_retryable());
        assert!(!PartnerError::Rejected { status: 400, body: String::new() }.is_retryable());
        assert!(!PartnerError::UnknownPartner("P9".into()).is_retryable());
    }
}
