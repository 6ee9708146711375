//! HTTP client for partner ledgers and webhooks.
//!
//! - Ledger: `POST {ledger_base_url}/credit` or `/debit` with `X-Api-Key`
//! - Webhook: `POST {webhook_url}` with `X-Signature: hex(HMAC-SHA256(secret, body))`
//!   when the partner has a webhook secret

use std::collections::HashMap;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::Sha256;

use crate::config::PartnerConfig;
use crate::domain::foundation::PartnerId;
use crate::domain::payment::hex_encode;
use crate::ports::{
    LedgerReceipt, LedgerRequest, PartnerError, PartnerLedger, PartnerNotifier, StatusNotification,
};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Signature";
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Ledger response; partners return their own reference under one of
/// these names, or nothing.
#[derive(Debug, Default, Deserialize)]
struct LedgerResponse {
    #[serde(alias = "ledger_reference", alias = "transaction_id", alias = "id")]
    reference: Option<String>,
}

/// Partner ledger + notifier over HTTP.
pub struct HttpPartnerClient {
    partners: HashMap<String, PartnerConfig>,
    http: Client,
}

impl HttpPartnerClient {
    pub fn new(partners: Vec<PartnerConfig>) -> Result<Self, PartnerError> {
        let http = Client::builder()
            .build()
            .map_err(|e| PartnerError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        let partners = partners
            .into_iter()
            .map(|partner| (partner.partner_id.clone(), partner))
            .collect();

        Ok(Self { partners, http })
    }

    fn partner(&self, partner_id: &PartnerId) -> Result<&PartnerConfig, PartnerError> {
        self.partners
            .get(partner_id.as_str())
            .ok_or_else(|| PartnerError::UnknownPartner(partner_id.to_string()))
    }

    fn ledger_url(partner: &PartnerConfig, operation: &str) -> Result<String, PartnerError> {
        let base = partner
            .ledger_base_url
            .as_deref()
            .ok_or_else(|| PartnerError::NotConfigured {
                partner_id: partner.partner_id.clone(),
                what: "ledger_base_url".to_string(),
            })?;
        Ok(format!("{}/{}", base.trim_end_matches('/'), operation))
    }

    async fn ledger_call(
        &self,
        partner_id: &PartnerId,
        operation: &str,
        request: &LedgerRequest,
    ) -> Result<LedgerReceipt, PartnerError> {
        let partner = self.partner(partner_id)?;
        let url = Self::ledger_url(partner, operation)?;

        let mut builder = self
            .http
            .post(&url)
            .timeout(partner.timeout())
            .json(request);
        if let Some(key) = &partner.api_key {
            builder = builder.header(API_KEY_HEADER, key.expose_secret());
        }

        let body = send(builder).await?;
        let parsed: LedgerResponse = serde_json::from_str(&body).unwrap_or_default();

        tracing::debug!(
            partner_id = %partner_id,
            transaction_ref = %request.transaction_ref,
            operation,
            "Partner ledger accepted request"
        );
        Ok(LedgerReceipt {
            reference: parsed.reference,
        })
    }
}

#[async_trait]
impl PartnerLedger for HttpPartnerClient {
    async fn credit_user(
        &self,
        partner_id: &PartnerId,
        request: &LedgerRequest,
    ) -> Result<LedgerReceipt, PartnerError> {
        self.ledger_call(partner_id, "credit", request).await
    }

    async fn debit_user(
        &self,
        partner_id: &PartnerId,
        request: &LedgerRequest,
    ) -> Result<LedgerReceipt, PartnerError> {
        self.ledger_call(partner_id, "debit", request).await
    }
}

#[async_trait]
impl PartnerNotifier for HttpPartnerClient {
    async fn notify(
        &self,
        partner_id: &PartnerId,
        notification: &StatusNotification,
    ) -> Result<(), PartnerError> {
        let partner = self.partner(partner_id)?;
        let url = partner
            .webhook_url
            .as_deref()
            .ok_or_else(|| PartnerError::NotConfigured {
                partner_id: partner.partner_id.clone(),
                what: "webhook_url".to_string(),
            })?;

        let body = serde_json::to_vec(notification)
            .map_err(|e| PartnerError::Transport(format!("unserializable notification: {}", e)))?;

        let mut builder = self
            .http
            .post(url)
            .timeout(partner.timeout())
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(secret) = &partner.webhook_secret {
            builder = builder.header(SIGNATURE_HEADER, sign(secret.expose_secret(), &body)?);
        }

        send(builder.body(body)).await?;
        Ok(())
    }
}

/// `hex(HMAC-SHA256(secret, body))`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, PartnerError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PartnerError::Transport(format!("invalid signing key: {}", e)))?;
    mac.update(body);
    Ok(hex_encode(&mac.finalize().into_bytes()))
}

async fn send(builder: RequestBuilder) -> Result<String, PartnerError> {
    let response = builder
        .send()
        .await
        .map_err(|e| PartnerError::Transport(e.to_string()))?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(PartnerError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_partner;

    fn client() -> HttpPartnerClient {
        HttpPartnerClient::new(vec![test_partner("P1")]).unwrap()
    }

    #[test]
    fn ledger_url_joins_base_and_operation() {
        let partner = test_partner("P1");
        assert_eq!(
            HttpPartnerClient::ledger_url(&partner, "credit").unwrap(),
            "https://ledger.example.com/api/credit"
        );
    }

    #[test]
    fn missing_ledger_url_is_not_configured() {
        let mut partner = test_partner("P1");
        partner.ledger_base_url = None;
        let err = HttpPartnerClient::ledger_url(&partner, "debit").unwrap_err();
        assert!(matches!(err, PartnerError::NotConfigured { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn unknown_partner_is_rejected() {
        let err = client()
            .partner(&PartnerId::new("P9").unwrap())
            .unwrap_err();
        assert_eq!(err, PartnerError::UnknownPartner("P9".to_string()));
    }

    #[test]
    fn signature_is_hex_hmac_sha256() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        let signature = sign("key", b"The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(
            signature,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn ledger_response_reads_reference_aliases() {
        let parsed: LedgerResponse =
            serde_json::from_str(r#"{"transaction_id": "L-42"}"#).unwrap();
        assert_eq!(parsed.reference.as_deref(), Some("L-42"));
    }
}
