//! Enumerations describing who moves money, in which direction and how.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Payment rail a request is routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Mpesa,
    Bank,
    Card,
    Paypal,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Mpesa => "mpesa",
            Provider::Bank => "bank",
            Provider::Card => "card",
            Provider::Paypal => "paypal",
        }
    }

    /// Whether the rail addresses the payer by phone number.
    pub fn requires_phone(&self) -> bool {
        matches!(self, Provider::Mpesa)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mpesa" | "m-pesa" => Ok(Provider::Mpesa),
            "bank" => Ok(Provider::Bank),
            "card" => Ok(Provider::Card),
            "paypal" => Ok(Provider::Paypal),
            other => Err(ValidationError::invalid_format(
                "provider",
                format!("unknown provider '{}'", other),
            )),
        }
    }
}

/// Direction of the money movement from the end user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Deposit,
    Withdrawal,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Deposit => "deposit",
            PaymentType::Withdrawal => "withdrawal",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(PaymentType::Deposit),
            "withdrawal" => Ok(PaymentType::Withdrawal),
            other => Err(ValidationError::invalid_format(
                "type",
                format!("unknown payment type '{}'", other),
            )),
        }
    }
}

/// Provider API used for a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    StkPush,
    B2c,
    B2b,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::StkPush => "stk_push",
            TransactionType::B2c => "b2c",
            TransactionType::B2b => "b2b",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stk_push" => Ok(TransactionType::StkPush),
            "b2c" => Ok(TransactionType::B2c),
            "b2b" => Ok(TransactionType::B2b),
            other => Err(ValidationError::invalid_format(
                "transaction_type",
                format!("unknown transaction type '{}'", other),
            )),
        }
    }
}
