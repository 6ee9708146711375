//! Daraja wire types.
//!
//! Field names follow the Daraja API exactly, including its spelling
//! (`RecieverIdentifierType`).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rust_decimal::prelude::{RoundingStrategy, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::Timestamp;
use crate::ports::ProviderError;

/// Daraja timestamps are East Africa Time (UTC+3, no DST).
const EAT_OFFSET_SECS: i64 = 3 * 3600;

/// Identifier type for a paybill / till shortcode.
pub const SHORTCODE_IDENTIFIER: &str = "4";

pub const STK_TRANSACTION_TYPE: &str = "CustomerPayBillOnline";

/// Daraja's "accepted" response code.
pub const ACCEPTED_RESPONSE_CODE: &str = "0";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushBody {
    pub business_short_code: String,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: String,
    pub amount: i64,
    pub party_a: String,
    pub party_b: String,
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub call_back_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct B2cBody {
    pub initiator_name: String,
    pub security_credential: String,
    #[serde(rename = "CommandID")]
    pub command_id: String,
    pub amount: i64,
    pub party_a: String,
    pub party_b: String,
    pub remarks: String,
    #[serde(rename = "QueueTimeOutURL")]
    pub queue_time_out_url: String,
    #[serde(rename = "ResultURL")]
    pub result_url: String,
    pub occasion: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct B2bBody {
    pub initiator: String,
    pub security_credential: String,
    #[serde(rename = "CommandID")]
    pub command_id: String,
    pub sender_identifier_type: String,
    pub reciever_identifier_type: String,
    pub amount: i64,
    pub party_a: String,
    pub party_b: String,
    pub account_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,
    pub remarks: String,
    #[serde(rename = "QueueTimeOutURL")]
    pub queue_time_out_url: String,
    #[serde(rename = "ResultURL")]
    pub result_url: String,
}

/// Synchronous response of STK / B2C / B2B requests.
///
/// Success bodies carry `ResponseCode`; error bodies carry `errorCode`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DarajaResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ConversationID")]
    pub conversation_id: Option<String>,
    #[serde(rename = "OriginatorConversationID")]
    pub originator_conversation_id: Option<String>,
    #[serde(rename = "ResponseCode")]
    pub response_code: Option<String>,
    #[serde(rename = "ResponseDescription")]
    pub response_description: Option<String>,
    #[serde(rename = "errorCode")]
    pub error_code: Option<String>,
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,
}

impl DarajaResponse {
    /// Lenient read; an unexpected body yields an empty response.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn is_accepted(&self) -> bool {
        self.response_code.as_deref() == Some(ACCEPTED_RESPONSE_CODE)
    }

    pub fn code(&self) -> String {
        self.response_code
            .clone()
            .or_else(|| self.error_code.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn description(&self) -> String {
        self.response_description
            .clone()
            .or_else(|| self.error_message.clone())
            .unwrap_or_default()
    }
}

/// OAuth client-credentials response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Daraja sends seconds as a string; tolerate a number too.
    #[serde(default)]
    pub expires_in: Value,
}

impl TokenResponse {
    pub fn expires_in_secs(&self) -> u64 {
        match &self.expires_in {
            Value::String(s) => s.trim().parse().unwrap_or(DEFAULT_TOKEN_TTL_SECS),
            Value::Number(n) => n.as_u64().unwrap_or(DEFAULT_TOKEN_TTL_SECS),
            _ => DEFAULT_TOKEN_TTL_SECS,
        }
    }
}

const DEFAULT_TOKEN_TTL_SECS: u64 = 3599;

/// `base64(shortcode + passkey + timestamp)`.
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{}{}{}", shortcode, passkey, timestamp))
}

/// Current time as a Daraja `YYYYMMDDHHMMSS` timestamp.
pub fn daraja_timestamp() -> String {
    Timestamp::now().plus_secs(EAT_OFFSET_SECS).to_compact()
}

/// M-Pesa only moves whole shillings.
pub fn whole_units(amount: Decimal) -> Result<i64, ProviderError> {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    match rounded.to_i64() {
        Some(units) if units > 0 => Ok(units),
        _ => Err(ProviderError::invalid_request(format!(
            "amount {} is not a positive whole-unit value",
            amount
        ))),
    }
}
