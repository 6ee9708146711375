//! Lifecycle statuses for payments and provider transactions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};

/// Status of a payment.
///
/// ```text
/// Pending ──► Processing ──► Completed
///    │            │
///    │            ├────────► Failed
///    │            └────────► Cancelled
///    ├─────────────────────► Failed
///    └─────────────────────► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 5] = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Completed,
        PaymentStatus::Failed,
        PaymentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, target),
            (Pending, Processing)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Cancelled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Pending => vec![Processing, Failed, Cancelled],
            Processing => vec![Completed, Failed, Cancelled],
            Completed | Failed | Cancelled => vec![],
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                ValidationError::invalid_format("status", format!("unknown payment status '{}'", s))
            })
    }
}

/// Status of a single provider API attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTransactionStatus {
    Initiated,
    Sent,
    Completed,
    Failed,
}

impl ProviderTransactionStatus {
    pub const ALL: [ProviderTransactionStatus; 4] = [
        ProviderTransactionStatus::Initiated,
        ProviderTransactionStatus::Sent,
        ProviderTransactionStatus::Completed,
        ProviderTransactionStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTransactionStatus::Initiated => "initiated",
            ProviderTransactionStatus::Sent => "sent",
            ProviderTransactionStatus::Completed => "completed",
            ProviderTransactionStatus::Failed => "failed",
        }
    }
}

impl StateMachine for ProviderTransactionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ProviderTransactionStatus::*;
        matches!(
            (self, target),
            (Initiated, Sent) | (Initiated, Failed) | (Sent, Completed) | (Sent, Failed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ProviderTransactionStatus::*;
        match self {
            Initiated => vec![Sent, Failed],
            Sent => vec![Completed, Failed],
            Completed | Failed => vec![],
        }
    }
}

impl fmt::Display for ProviderTransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderTransactionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderTransactionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                ValidationError::invalid_format(
                    "status",
                    format!("unknown provider transaction status '{}'", s),
                )
            })
    }
}
