//! Mock mobile money provider for testing.
//!
//! Accepts every request by default and issues sequential correlation keys
//! (`ws_1`, `ws_2`, ...). Supports:
//! - Error injection (transport failures)
//! - Rejection injection (provider answers but refuses)
//! - Call tracking

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::json;

use crate::domain::payment::Provider;
use crate::ports::{
    B2bRequest, B2cRequest, MobileMoneyProvider, ProviderAck, ProviderError, StkPushRequest,
};

/// Recorded provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    StkPush(StkPushRequest),
    B2c(B2cRequest),
    B2b(B2bRequest),
}

impl ProviderCall {
    pub fn amount(&self) -> rust_decimal::Decimal {
        match self {
            ProviderCall::StkPush(r) => r.amount,
            ProviderCall::B2c(r) => r.amount,
            ProviderCall::B2b(r) => r.amount,
        }
    }
}

#[derive(Default)]
struct MockState {
    issued: u32,
    next_error: Option<ProviderError>,
    next_rejection: Option<(String, String)>,
    calls: Vec<ProviderCall>,
}

/// Mock M-Pesa provider.
///
/// # Example
///
/// ```ignore
/// let provider = MockMobileMoneyProvider::new();
/// provider.fail_next(ProviderError::timeout("no response"));
/// ```
#[derive(Clone, Default)]
pub struct MockMobileMoneyProvider {
    inner: Arc<Mutex<MockState>>,
}

impl MockMobileMoneyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next call with a transport error.
    pub fn fail_next(&self, error: ProviderError) {
        self.state().next_error = Some(error);
    }

    /// Answer the next call with a rejected ack.
    pub fn reject_next(&self, code: impl Into<String>, description: impl Into<String>) {
        self.state().next_rejection = Some((code.into(), description.into()));
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    fn respond(&self, call: ProviderCall, stk: bool) -> Result<ProviderAck, ProviderError> {
        let mut state = self.state();
        state.calls.push(call);

        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        state.issued += 1;
        let key = format!("ws_{}", state.issued);
        let request_payload = json!({ "mock": true, "sequence": state.issued });

        if let Some((code, description)) = state.next_rejection.take() {
            return Ok(ProviderAck {
                accepted: false,
                response_code: code.clone(),
                response_description: description.clone(),
                provider_tx_id: None,
                checkout_request_id: None,
                originator_conversation_id: None,
                request_payload,
                response_payload: json!({ "errorCode": code, "errorMessage": description }),
            });
        }

        let (provider_tx_id, checkout_request_id, originator_conversation_id) = if stk {
            (format!("mr_{}", state.issued), Some(key.clone()), None)
        } else {
            (key.clone(), None, Some(format!("oc_{}", state.issued)))
        };

        Ok(ProviderAck {
            accepted: true,
            response_code: "0".to_string(),
            response_description: "Success. Request accepted for processing".to_string(),
            provider_tx_id: Some(provider_tx_id),
            checkout_request_id,
            originator_conversation_id,
            request_payload,
            response_payload: json!({ "ResponseCode": "0", "CorrelationKey": key }),
        })
    }
}

#[async_trait]
impl MobileMoneyProvider for MockMobileMoneyProvider {
    fn provider(&self) -> Provider {
        Provider::Mpesa
    }

    async fn stk_push(&self, request: &StkPushRequest) -> Result<ProviderAck, ProviderError> {
        self.respond(ProviderCall::StkPush(request.clone()), true)
    }

    async fn b2c_payment(&self, request: &B2cRequest) -> Result<ProviderAck, ProviderError> {
        self.respond(ProviderCall::B2c(request.clone()), false)
    }

    async fn b2b_payment(&self, request: &B2bRequest) -> Result<ProviderAck, ProviderError> {
        self.respond(ProviderCall::B2b(request.clone()), false)
    }
}
