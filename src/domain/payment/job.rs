//! Background work items written to the job outbox.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::PaymentId;

/// A unit of work that calls out to a third party.
///
/// Serialized as `{"kind": "...", "payment_id": "..."}` into the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentJob {
    /// Send a pending payment to its provider.
    Dispatch { payment_id: PaymentId },
    /// Credit or debit the partner ledger for a completed payment.
    Settle { payment_id: PaymentId },
    /// Push the final status to the partner's webhook.
    Notify { payment_id: PaymentId },
}

impl PaymentJob {
    pub fn payment_id(&self) -> PaymentId {
        match self {
            PaymentJob::Dispatch { payment_id }
            | PaymentJob::Settle { payment_id }
            | PaymentJob::Notify { payment_id } => *payment_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PaymentJob::Dispatch { .. } => "dispatch",
            PaymentJob::Settle { .. } => "settle",
            PaymentJob::Notify { .. } => "notify",
        }
    }
}

impl fmt::Display for PaymentJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.payment_id())
    }
}
