//! Currency-conversion metadata carried by every payment.
//!
//! A payment is booked in the partner's ledger currency (e.g. USD) but the
//! provider moves money in the payer's local currency (e.g. KES). The
//! original local amount travels in the JSON metadata and is the only
//! amount ever sent to the provider.

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

const ORIGINAL_AMOUNT: &str = "original_amount";
const ORIGINAL_CURRENCY: &str = "original_currency";
const EXCHANGE_RATE: &str = "exchange_rate";
const TARGET_CURRENCY: &str = "target_currency";

/// Typed view over the conversion fields of a payment's metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaymentMetadata {
    pub original_amount: Option<Decimal>,
    pub original_currency: Option<String>,
    pub exchange_rate: Option<Decimal>,
    pub target_currency: Option<String>,
}

impl PaymentMetadata {
    /// Reads the conversion fields, accepting amounts as strings or numbers.
    ///
    /// Unparseable values are treated as absent; use [`Self::validate`] to
    /// reject them at intake.
    pub fn from_value(value: &Value) -> Self {
        let map = match value.as_object() {
            Some(map) => map,
            None => return Self::default(),
        };

        Self {
            original_amount: decimal_field(map, ORIGINAL_AMOUNT),
            original_currency: string_field(map, ORIGINAL_CURRENCY),
            exchange_rate: decimal_field(map, EXCHANGE_RATE),
            target_currency: string_field(map, TARGET_CURRENCY),
        }
    }

    /// Checks the fields intake depends on.
    pub fn validate(value: &Value) -> Result<Self, ValidationError> {
        let map = value
            .as_object()
            .ok_or_else(|| ValidationError::invalid_format("metadata", "must be a JSON object"))?;

        if !map.contains_key(ORIGINAL_AMOUNT) {
            return Err(ValidationError::empty_field("metadata.original_amount"));
        }
        let original_amount = decimal_field(map, ORIGINAL_AMOUNT).ok_or_else(|| {
            ValidationError::invalid_format("metadata.original_amount", "not a decimal number")
        })?;
        if original_amount <= Decimal::ZERO {
            return Err(ValidationError::not_positive(
                "metadata.original_amount",
                original_amount,
            ));
        }

        let original_currency = string_field(map, ORIGINAL_CURRENCY)
            .ok_or_else(|| ValidationError::empty_field("metadata.original_currency"))?;

        Ok(Self {
            original_amount: Some(original_amount),
            original_currency: Some(original_currency),
            exchange_rate: decimal_field(map, EXCHANGE_RATE),
            target_currency: string_field(map, TARGET_CURRENCY),
        })
    }
}

fn decimal_field(map: &Map<String, Value>, key: &str) -> Option<Decimal> {
    match map.get(key)? {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => {
            let repr = n.to_string();
            Decimal::from_str(&repr)
                .or_else(|_| Decimal::from_scientific(&repr))
                .ok()
        }
        _ => None,
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn reads_string_amounts() {
        let meta = PaymentMetadata::from_value(&json!({
            "original_amount": "1300",
            "original_currency": "kes",
            "exchange_rate": "130.0",
            "target_currency": "USD"
        }));
        assert_eq!(meta.original_amount, Some(dec!(1300)));
        assert_eq!(meta.original_currency.as_deref(), Some("KES"));
        assert_eq!(meta.exchange_rate, Some(dec!(130.0)));
    }

    #[test]
    fn reads_numeric_amounts() {
        let meta = PaymentMetadata::from_value(&json!({"original_amount": 1300.5}));
        assert_eq!(meta.original_amount, Some(dec!(1300.5)));
    }

    #[test]
    fn validate_requires_original_amount() {
        let err = PaymentMetadata::validate(&json!({"original_currency": "KES"})).unwrap_err();
        assert_eq!(err.field(), "metadata.original_amount");
    }

    #[test]
    fn validate_rejects_zero_amount() {
        let err = PaymentMetadata::validate(&json!({
            "original_amount": "0",
            "original_currency": "KES"
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::NotPositive { .. }));
    }

    #[test]
    fn validate_requires_currency() {
        let err = PaymentMetadata::validate(&json!({"original_amount": "10"})).unwrap_err();
        assert_eq!(err.field(), "metadata.original_currency");
    }

    #[test]
    fn non_object_metadata_is_rejected() {
        assert!(PaymentMetadata::validate(&json!("1300")).is_err());
        assert_eq!(PaymentMetadata::from_value(&Value::Null), PaymentMetadata::default());
    }
}
