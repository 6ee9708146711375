//! Daraja webhook parsers.
//!
//! # Shapes
//!
//! STK push results arrive as `Body.stkCallback`, keyed by
//! `CheckoutRequestID`. B2C results arrive as `Result`, keyed by
//! `ConversationID`, with `ResultParameters.ResultParameter` as a list.
//!
//! B2B results are less regular in practice. They are tried against an
//! ordered chain of structural parsers and the first match wins:
//!
//! 1. [`PayloadShape::List`] - `Result` with a parameter list
//! 2. [`PayloadShape::SingleObject`] - `Result` with one parameter object
//! 3. [`PayloadShape::ResultOnly`] - `Result` without parameters
//! 4. [`PayloadShape::Flat`] - result fields at the top level

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::domain::payment::{CallbackFlow, CallbackResult, PaymentError, Provider};
use crate::ports::CallbackParser;

/// Which B2B payload shape matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    List,
    SingleObject,
    ResultOnly,
    Flat,
}

impl PayloadShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadShape::List => "list",
            PayloadShape::SingleObject => "single_object",
            PayloadShape::ResultOnly => "result_only",
            PayloadShape::Flat => "flat",
        }
    }
}

impl fmt::Display for PayloadShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A B2B result tagged with the shape it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedResult {
    pub shape: PayloadShape,
    pub result: CallbackResult,
}

type ShapeParser = fn(&Value) -> Option<CallbackResult>;

const B2B_CHAIN: [(PayloadShape, ShapeParser); 4] = [
    (PayloadShape::List, parse_list_shape),
    (PayloadShape::SingleObject, parse_single_object_shape),
    (PayloadShape::ResultOnly, parse_result_only_shape),
    (PayloadShape::Flat, parse_flat_shape),
];

/// Parser for all three Daraja callback flows.
#[derive(Debug, Clone, Copy, Default)]
pub struct MpesaCallbackParser;

impl MpesaCallbackParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_stk(payload: &Value) -> Result<CallbackResult, String> {
        let callback = payload
            .get("Body")
            .and_then(|body| body.get("stkCallback"))
            .and_then(Value::as_object)
            .ok_or("missing Body.stkCallback")?;

        let code = callback
            .get("ResultCode")
            .and_then(lenient_i64)
            .ok_or("missing or non-numeric ResultCode")?;
        let checkout_id = string_field(callback, "CheckoutRequestID")
            .ok_or("missing CheckoutRequestID")?;
        let description = string_field(callback, "ResultDesc").unwrap_or_default();

        let items = callback
            .get("CallbackMetadata")
            .and_then(|meta| meta.get("Item"))
            .map(|items| parameters(items, "Name"))
            .unwrap_or_default();

        let mut result = CallbackResult::from_code(code, description).with_correlation_key(checkout_id);
        result.provider_receipt = param(&items, &["MpesaReceiptNumber"]).and_then(lenient_string);
        result.amount = param(&items, &["Amount"]).and_then(lenient_decimal);
        result.phone_number = param(&items, &["PhoneNumber"]).and_then(lenient_string);
        result.transaction_date = param(&items, &["TransactionDate"]).and_then(lenient_string);
        Ok(result)
    }

    pub fn parse_b2c(payload: &Value) -> Result<CallbackResult, String> {
        parse_list_shape(payload)
            .or_else(|| parse_result_only_shape(payload))
            .ok_or_else(|| "missing Result envelope with ResultCode and ConversationID".to_string())
    }

    pub fn parse_b2b(payload: &Value) -> Result<ShapedResult, String> {
        B2B_CHAIN
            .iter()
            .find_map(|(shape, parser)| {
                parser(payload).map(|result| ShapedResult {
                    shape: *shape,
                    result,
                })
            })
            .ok_or_else(|| "payload matches no known B2B result shape".to_string())
    }
}

impl CallbackParser for MpesaCallbackParser {
    fn provider(&self) -> Provider {
        Provider::Mpesa
    }

    fn parse(&self, flow: CallbackFlow, payload: &Value) -> Result<CallbackResult, PaymentError> {
        let parsed = match flow {
            CallbackFlow::Stk => Self::parse_stk(payload),
            CallbackFlow::B2c => Self::parse_b2c(payload),
            CallbackFlow::B2b => Self::parse_b2b(payload).map(|shaped| {
                tracing::debug!(shape = %shaped.shape, "Parsed B2B callback");
                shaped.result
            }),
        };
        parsed.map_err(|reason| PaymentError::parse(flow, reason))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Structural parsers
// ════════════════════════════════════════════════════════════════════════════

fn result_envelope(payload: &Value) -> Option<&Map<String, Value>> {
    payload.get("Result").and_then(Value::as_object)
}

fn result_parameter(result: &Map<String, Value>) -> Option<&Value> {
    result
        .get("ResultParameters")
        .and_then(|params| params.get("ResultParameter"))
}

fn parse_list_shape(payload: &Value) -> Option<CallbackResult> {
    let result = result_envelope(payload)?;
    let list = result_parameter(result)?;
    if !list.is_array() {
        return None;
    }
    read_result(result, &parameters(list, "Key"))
}

fn parse_single_object_shape(payload: &Value) -> Option<CallbackResult> {
    let result = result_envelope(payload)?;
    let single = result_parameter(result)?;
    if !single.is_object() {
        return None;
    }
    read_result(result, &parameters(single, "Key"))
}

fn parse_result_only_shape(payload: &Value) -> Option<CallbackResult> {
    let result = result_envelope(payload)?;
    if result_parameter(result).is_some() {
        return None;
    }
    read_result(result, &[])
}

/// Result fields directly on the root; any non-envelope scalar is treated
/// as a parameter.
fn parse_flat_shape(payload: &Value) -> Option<CallbackResult> {
    let root = payload.as_object()?;
    let params: Vec<(String, Value)> = root
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    read_result(root, &params)
}

fn read_result(result: &Map<String, Value>, params: &[(String, Value)]) -> Option<CallbackResult> {
    let code = result.get("ResultCode").and_then(lenient_i64)?;
    let correlation_key = string_field(result, "ConversationID")
        .or_else(|| string_field(result, "OriginatorConversationID"))?;
    let description = string_field(result, "ResultDesc").unwrap_or_default();

    let mut callback = CallbackResult::from_code(code, description).with_correlation_key(correlation_key);
    callback.provider_receipt = string_field(result, "TransactionID")
        .or_else(|| param(params, &["TransactionReceipt"]).and_then(lenient_string));
    callback.amount = param(params, &["TransactionAmount", "Amount"]).and_then(lenient_decimal);
    callback.transaction_date = param(
        params,
        &["TransactionCompletedDateTime", "TransCompletedTime"],
    )
    .and_then(lenient_string);
    callback.phone_number = param(params, &["ReceiverPartyPublicName"])
        .and_then(lenient_string)
        .and_then(|name| msisdn_prefix(&name));
    Some(callback)
}

// ════════════════════════════════════════════════════════════════════════════
// Value helpers
// ════════════════════════════════════════════════════════════════════════════

/// Collects `[{<key_field>: .., "Value": ..}]` (or a single such object)
/// into pairs.
fn parameters(items: &Value, key_field: &str) -> Vec<(String, Value)> {
    let entry = |item: &Value| {
        let key = item.get(key_field)?.as_str()?.to_string();
        let value = item.get("Value").cloned().unwrap_or(Value::Null);
        Some((key, value))
    };
    match items {
        Value::Array(list) => list.iter().filter_map(entry).collect(),
        Value::Object(_) => entry(items).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn param<'a>(params: &'a [(String, Value)], names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| {
        params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    })
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(lenient_string)
}

fn lenient_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_decimal(value: &Value) -> Option<Decimal> {
    let repr = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&repr)
        .or_else(|_| Decimal::from_scientific(&repr))
        .ok()
}

/// `"254722000000 - Jane Doe"` -> `"254722000000"`.
fn msisdn_prefix(public_name: &str) -> Option<String> {
    let head = public_name.split('-').next()?.trim();
    (!head.is_empty() && head.chars().all(|c| c.is_ascii_digit())).then(|| head.to_string())
}
