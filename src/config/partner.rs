//! Partner configuration
//!
//! Partners are usually listed in the file named by `PESA_BRIDGE_CONFIG`:
//!
//! ```toml
//! [[partners]]
//! partner_id = "P1"
//! ledger_base_url = "https://ledger.partner.example/api"
//! webhook_url = "https://partner.example/hooks/payments"
//! api_key = "..."
//! webhook_secret = "..."
//! ```

use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use super::error::ValidationError;
use super::mpesa::is_http_url;

/// Connection details for one partner's ledger and webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct PartnerConfig {
    pub partner_id: String,

    /// `POST {ledger_base_url}/credit|debit`
    pub ledger_base_url: Option<String>,

    pub webhook_url: Option<String>,

    /// Sent as `X-Api-Key` on ledger calls.
    pub api_key: Option<SecretString>,

    /// Signs webhook bodies (`X-Signature`) when set.
    pub webhook_secret: Option<SecretString>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl PartnerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.partner_id.trim().is_empty() {
            return Err(ValidationError::EmptyPartnerId);
        }
        if let Some(url) = &self.ledger_base_url {
            if !is_http_url(url) {
                return Err(ValidationError::InvalidUrl("partners.ledger_base_url"));
            }
        }
        if let Some(url) = &self.webhook_url {
            if !is_http_url(url) {
                return Err(ValidationError::InvalidUrl("partners.webhook_url"));
            }
        }
        if self.timeout_secs == 0 || self.timeout_secs > 120 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Validates every entry and rejects duplicate partner IDs.
pub fn validate_partners(partners: &[PartnerConfig]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for partner in partners {
        partner.validate()?;
        if !seen.insert(partner.partner_id.as_str()) {
            return Err(ValidationError::DuplicatePartner(partner.partner_id.clone()));
        }
    }
    Ok(())
}

fn default_timeout() -> u64 {
    15
}

#[cfg(test)]
pub(crate) fn test_partner(partner_id: &str) -> PartnerConfig {
    PartnerConfig {
        partner_id: partner_id.to_string(),
        ledger_base_url: Some("https://ledger.example.com/api/".to_string()),
        webhook_url: Some("https://partner.example.com/hooks".to_string()),
        api_key: Some(SecretString::new("api-key".to_string())),
        webhook_secret: Some(SecretString::new("whsec".to_string())),
        timeout_secs: default_timeout(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_partner_list() {
        assert!(validate_partners(&[test_partner("P1"), test_partner("P2")]).is_ok());
    }

    #[test]
    fn test_duplicate_partner_rejected() {
        assert_eq!(
            validate_partners(&[test_partner("P1"), test_partner("P1")]),
            Err(ValidationError::DuplicatePartner("P1".to_string()))
        );
    }

    #[test]
    fn test_bad_webhook_url_rejected() {
        let partner = PartnerConfig {
            webhook_url: Some("ftp://partner".to_string()),
            ..test_partner("P1")
        };
        assert!(partner.validate().is_err());
    }
}
