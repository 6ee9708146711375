//! Daraja HTTP client implementing `MobileMoneyProvider`.
//!
//! # Authentication
//!
//! Every API call carries an OAuth bearer token obtained with the consumer
//! key/secret (client-credentials, basic auth). The token is cached and
//! refreshed `token_refresh_margin` before Daraja expires it; a 401 on an
//! API call drops the cached token so the next call fetches a fresh one.
//!
//! # Acks
//!
//! - 2xx with `ResponseCode = "0"`: accepted
//! - 2xx with another code, or 4xx with an error body: rejected ack
//! - 401: [`ProviderErrorCode::AuthenticationError`]
//! - 5xx: retryable [`ProviderErrorCode::ProviderUnavailable`]

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::MpesaConfig;
use crate::domain::payment::Provider;
use crate::ports::{
    B2bRequest, B2cRequest, MobileMoneyProvider, ProviderAck, ProviderError, ProviderErrorCode,
    StkPushRequest,
};

use super::wire::{
    daraja_timestamp, stk_password, whole_units, B2bBody, B2cBody, DarajaResponse, StkPushBody,
    TokenResponse, SHORTCODE_IDENTIFIER, STK_TRANSACTION_TYPE,
};

const OAUTH_PATH: &str = "/oauth/v1/generate?grant_type=client_credentials";
const STK_PUSH_PATH: &str = "/mpesa/stkpush/v1/processrequest";
const B2C_PATH: &str = "/mpesa/b2c/v1/paymentrequest";
const B2B_PATH: &str = "/mpesa/b2b/v1/paymentrequest";

/// Request fields never written to the audit trail.
const REDACTED_FIELDS: [&str; 2] = ["Password", "SecurityCredential"];

struct CachedToken {
    value: SecretString,
    refresh_at: Instant,
}

/// M-Pesa Daraja adapter.
pub struct MpesaClient {
    config: MpesaConfig,
    http: Client,
    token: Mutex<Option<CachedToken>>,
}

impl MpesaClient {
    /// Build a client with the configured request timeout.
    pub fn new(config: MpesaConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ProviderError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url(), path)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // OAuth
    // ════════════════════════════════════════════════════════════════════════════

    async fn access_token(&self) -> Result<SecretString, ProviderError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn fetch_token(&self) -> Result<CachedToken, ProviderError> {
        tracing::debug!("Fetching Daraja access token");

        let response = self
            .http
            .get(self.url(OAUTH_PATH))
            .basic_auth(
                &self.config.consumer_key,
                Some(self.config.consumer_secret.expose_secret()),
            )
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "Daraja token request failed");
            return Err(match status.as_u16() {
                500..=599 => ProviderError::unavailable(format!(
                    "token endpoint returned {}: {}",
                    status, body
                )),
                _ => ProviderError::authentication(format!(
                    "token endpoint returned {}: {}",
                    status, body
                )),
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            ProviderError::authentication(format!("Failed to parse token response: {}", e))
        })?;

        let lifetime = Duration::from_secs(token.expires_in_secs());
        let usable = lifetime.saturating_sub(self.config.token_refresh_margin());

        Ok(CachedToken {
            value: SecretString::new(token.access_token),
            refresh_at: Instant::now() + usable,
        })
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Requests
    // ════════════════════════════════════════════════════════════════════════════

    fn security_credential(&self) -> Result<&str, ProviderError> {
        match &self.config.security_credential {
            Some(credential) if !credential.expose_secret().is_empty() => {
                Ok(credential.expose_secret())
            }
            _ => Err(ProviderError::authentication(
                "no initiator security credential configured",
            )),
        }
    }

    async fn submit<B: Serialize>(&self, path: &str, body: &B) -> Result<ProviderAck, ProviderError> {
        let request_payload = serde_json::to_value(body)
            .map_err(|e| ProviderError::invalid_request(format!("unserializable body: {}", e)))?;
        let token = self.access_token().await?;

        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(token.expose_secret())
            .json(&request_payload)
            .send()
            .await
            .map_err(transport_error)?;

        self.read_ack(redact(request_payload), response).await
    }

    async fn read_ack(
        &self,
        request_payload: Value,
        response: Response,
    ) -> Result<ProviderAck, ProviderError> {
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        let response_payload: Value =
            serde_json::from_str(&body).unwrap_or_else(|_| Value::String(body.clone()));

        match status.as_u16() {
            401 => {
                self.invalidate_token().await;
                return Err(ProviderError::authentication(format!(
                    "Daraja rejected the access token: {}",
                    body
                ))
                .with_provider_code("401"));
            }
            500..=599 => {
                return Err(ProviderError::unavailable(format!(
                    "Daraja error {}: {}",
                    status, body
                ))
                .with_provider_code(status.as_u16().to_string()));
            }
            _ => {}
        }

        let parsed = DarajaResponse::from_value(&response_payload);
        if parsed.response_code.is_none() && parsed.error_code.is_none() {
            return Err(ProviderError::new(
                ProviderErrorCode::Unknown,
                format!("Unexpected Daraja response {}: {}", status, body),
            ));
        }

        let accepted = status.is_success() && parsed.is_accepted();
        let provider_tx_id = parsed
            .merchant_request_id
            .clone()
            .or_else(|| parsed.conversation_id.clone());

        Ok(ProviderAck {
            accepted,
            response_code: parsed.code(),
            response_description: parsed.description(),
            provider_tx_id,
            checkout_request_id: parsed.checkout_request_id.clone(),
            originator_conversation_id: parsed.originator_conversation_id.clone(),
            request_payload,
            response_payload,
        })
    }
}

#[async_trait]
impl MobileMoneyProvider for MpesaClient {
    fn provider(&self) -> Provider {
        Provider::Mpesa
    }

    async fn stk_push(&self, request: &StkPushRequest) -> Result<ProviderAck, ProviderError> {
        let timestamp = daraja_timestamp();
        let shortcode = self.config.shortcode.clone();
        let body = StkPushBody {
            password: stk_password(&shortcode, self.config.passkey.expose_secret(), &timestamp),
            business_short_code: shortcode.clone(),
            timestamp,
            transaction_type: STK_TRANSACTION_TYPE.to_string(),
            amount: whole_units(request.amount)?,
            party_a: request.phone_number.clone(),
            party_b: shortcode,
            phone_number: request.phone_number.clone(),
            call_back_url: request.callback_url.clone(),
            account_reference: request.account_reference.clone(),
            transaction_desc: request.description.clone(),
        };

        tracing::debug!(
            account_reference = %request.account_reference,
            amount = body.amount,
            "Sending STK push"
        );
        self.submit(STK_PUSH_PATH, &body).await
    }

    async fn b2c_payment(&self, request: &B2cRequest) -> Result<ProviderAck, ProviderError> {
        let body = B2cBody {
            initiator_name: self.config.initiator_name.clone(),
            security_credential: self.security_credential()?.to_string(),
            command_id: self.config.b2c_command_id.clone(),
            amount: whole_units(request.amount)?,
            party_a: self.config.shortcode.clone(),
            party_b: request.phone_number.clone(),
            remarks: request.remarks.clone(),
            queue_time_out_url: request.queue_timeout_url.clone(),
            result_url: request.result_url.clone(),
            occasion: request.occasion.clone(),
        };

        tracing::debug!(amount = body.amount, "Sending B2C payment");
        self.submit(B2C_PATH, &body).await
    }

    async fn b2b_payment(&self, request: &B2bRequest) -> Result<ProviderAck, ProviderError> {
        let body = B2bBody {
            initiator: self.config.initiator_name.clone(),
            security_credential: self.security_credential()?.to_string(),
            command_id: self.config.b2b_command_id.clone(),
            sender_identifier_type: SHORTCODE_IDENTIFIER.to_string(),
            reciever_identifier_type: SHORTCODE_IDENTIFIER.to_string(),
            amount: whole_units(request.amount)?,
            party_a: self.config.shortcode.clone(),
            party_b: request.receiver_shortcode.clone(),
            account_reference: request.account_reference.clone(),
            requester: request.requester.clone(),
            remarks: request.remarks.clone(),
            queue_time_out_url: request.queue_timeout_url.clone(),
            result_url: request.result_url.clone(),
        };

        tracing::debug!(
            account_reference = %request.account_reference,
            amount = body.amount,
            "Sending B2B payment"
        );
        self.submit(B2B_PATH, &body).await
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::timeout(e.to_string())
    } else if e.is_connect() {
        ProviderError::network(format!("Connection failed: {}", e))
    } else {
        ProviderError::network(e.to_string())
    }
}

fn redact(mut payload: Value) -> Value {
    if let Some(map) = payload.as_object_mut() {
        for field in REDACTED_FIELDS {
            if map.contains_key(field) {
                map.insert(field.to_string(), Value::String("[REDACTED]".to_string()));
            }
        }
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_mpesa_config;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn client() -> MpesaClient {
        MpesaClient::new(test_mpesa_config()).unwrap()
    }

    #[test]
    fn urls_use_configured_base() {
        let client = client();
        assert_eq!(
            client.url(STK_PUSH_PATH),
            "https://sandbox.safaricom.co.ke/mpesa/stkpush/v1/processrequest"
        );
        assert_eq!(
            client.url(OAUTH_PATH),
            "https://sandbox.safaricom.co.ke/oauth/v1/generate?grant_type=client_credentials"
        );
    }

    #[test]
    fn redact_masks_secrets_only() {
        let redacted = redact(json!({
            "Password": "c2VjcmV0",
            "SecurityCredential": "cred",
            "Amount": 1300
        }));
        assert_eq!(redacted["Password"], "[REDACTED]");
        assert_eq!(redacted["SecurityCredential"], "[REDACTED]");
        assert_eq!(redacted["Amount"], 1300);
    }

    #[test]
    fn missing_security_credential_is_an_auth_error() {
        let mut config = test_mpesa_config();
        config.security_credential = None;
        let client = MpesaClient::new(config).unwrap();

        let err = client.security_credential().unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::AuthenticationError);
        assert!(!err.retryable);
    }

    #[tokio::test]
    async fn fractional_amount_below_one_unit_fails_before_any_request() {
        let request = StkPushRequest {
            amount: dec!(0.3),
            phone_number: "254712345678".into(),
            account_reference: "TX1".into(),
            description: "deposit".into(),
            callback_url: "https://pay.example.com/callbacks/mpesa/stk/TX1".into(),
        };

        let err = client().stk_push(&request).await.unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn cached_token_is_reused_until_refresh_time() {
        let client = client();
        *client.token.lock().await = Some(CachedToken {
            value: SecretString::new("cached".to_string()),
            refresh_at: Instant::now() + Duration::from_secs(60),
        });

        let token = client.access_token().await.unwrap();
        assert_eq!(token.expose_secret(), "cached");
    }

    #[tokio::test]
    async fn invalidate_drops_cached_token() {
        let client = client();
        *client.token.lock().await = Some(CachedToken {
            value: SecretString::new("cached".to_string()),
            refresh_at: Instant::now() + Duration::from_secs(60),
        });

        client.invalidate_token().await;
        assert!(client.token.lock().await.is_none());
    }
}
