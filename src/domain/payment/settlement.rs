//! Settlement bookkeeping: one record per payment and settlement kind.
//!
//! Claiming a record before calling the partner ledger is what keeps a
//! completed payment from being credited or debited twice.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::foundation::{PaymentId, Timestamp, ValidationError};

use super::PaymentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementKind {
    Credit,
    Debit,
}

impl SettlementKind {
    pub fn for_payment_type(payment_type: PaymentType) -> Self {
        match payment_type {
            PaymentType::Deposit => SettlementKind::Credit,
            PaymentType::Withdrawal => SettlementKind::Debit,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementKind::Credit => "credit",
            SettlementKind::Debit => "debit",
        }
    }
}

impl fmt::Display for SettlementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettlementKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(SettlementKind::Credit),
            "debit" => Ok(SettlementKind::Debit),
            other => Err(ValidationError::invalid_format(
                "kind",
                format!("unknown settlement kind '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    /// Ledger call in progress or crashed mid-flight.
    Claimed,
    Settled,
    /// Ledger rejected the call; needs manual review.
    Failed,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Claimed => "claimed",
            SettlementStatus::Settled => "settled",
            SettlementStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettlementStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claimed" => Ok(SettlementStatus::Claimed),
            "settled" => Ok(SettlementStatus::Settled),
            "failed" => Ok(SettlementStatus::Failed),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown settlement status '{}'", other),
            )),
        }
    }
}

/// Unique on `(payment_id, kind)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub id: Uuid,
    pub payment_id: PaymentId,
    pub kind: SettlementKind,
    pub status: SettlementStatus,
    pub ledger_reference: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SettlementRecord {
    pub fn claim(payment_id: PaymentId, kind: SettlementKind) -> Self {
        let now = Timestamp::now();
        Self {
            id: Uuid::new_v4(),
            payment_id,
            kind,
            status: SettlementStatus::Claimed,
            ledger_reference: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_settled(&mut self, ledger_reference: Option<String>) {
        self.status = SettlementStatus::Settled;
        self.ledger_reference = ledger_reference;
        self.updated_at = Timestamp::now();
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = SettlementStatus::Failed;
        self.error_message = Some(error.into());
        self.updated_at = Timestamp::now();
    }
}
