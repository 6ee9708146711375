//! Parsed view of an inbound provider webhook.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::TransactionType;
use crate::domain::foundation::ValidationError;

/// Daraja result code signalling success.
pub const RESULT_CODE_SUCCESS: i64 = 0;

/// Which provider flow a callback URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackFlow {
    Stk,
    B2c,
    B2b,
}

impl CallbackFlow {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackFlow::Stk => "stk",
            CallbackFlow::B2c => "b2c",
            CallbackFlow::B2b => "b2b",
        }
    }

    pub fn for_transaction(transaction_type: TransactionType) -> Self {
        match transaction_type {
            TransactionType::StkPush => CallbackFlow::Stk,
            TransactionType::B2c => CallbackFlow::B2c,
            TransactionType::B2b => CallbackFlow::B2b,
        }
    }

    pub fn transaction_type(&self) -> TransactionType {
        match self {
            CallbackFlow::Stk => TransactionType::StkPush,
            CallbackFlow::B2c => TransactionType::B2c,
            CallbackFlow::B2b => TransactionType::B2b,
        }
    }
}

impl fmt::Display for CallbackFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallbackFlow {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stk" => Ok(CallbackFlow::Stk),
            "b2c" => Ok(CallbackFlow::B2c),
            "b2b" => Ok(CallbackFlow::B2b),
            other => Err(ValidationError::invalid_format(
                "flow",
                format!("unknown callback flow '{}'", other),
            )),
        }
    }
}

/// Outcome reported by the provider for one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackResult {
    pub success: bool,
    pub result_code: i64,
    pub result_description: String,
    /// Provider receipt (M-Pesa receipt / transaction ID).
    pub provider_receipt: Option<String>,
    pub amount: Option<Decimal>,
    /// Checkout or conversation ID matching the originating request.
    pub correlation_key: Option<String>,
    pub phone_number: Option<String>,
    pub transaction_date: Option<String>,
}

impl CallbackResult {
    /// Builds a result whose success flag follows the result code.
    pub fn from_code(result_code: i64, result_description: impl Into<String>) -> Self {
        Self {
            success: result_code == RESULT_CODE_SUCCESS,
            result_code,
            result_description: result_description.into(),
            provider_receipt: None,
            amount: None,
            correlation_key: None,
            phone_number: None,
            transaction_date: None,
        }
    }

    pub fn with_correlation_key(mut self, key: impl Into<String>) -> Self {
        self.correlation_key = Some(key.into());
        self
    }

    pub fn with_receipt(mut self, receipt: impl Into<String>) -> Self {
        self.provider_receipt = Some(receipt.into());
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_follows_result_code() {
        assert!(CallbackResult::from_code(0, "ok").success);
        assert!(!CallbackResult::from_code(1032, "Request cancelled by user").success);
    }

    #[test]
    fn flow_maps_to_transaction_type_and_back() {
        for flow in [CallbackFlow::Stk, CallbackFlow::B2c, CallbackFlow::B2b] {
            assert_eq!(CallbackFlow::for_transaction(flow.transaction_type()), flow);
            assert_eq!(flow.as_str().parse::<CallbackFlow>().unwrap(), flow);
        }
    }
}
