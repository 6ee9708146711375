//! Callback URL construction and token verification.
//!
//! The provider calls us back on a URL that embeds the payment ref. When a
//! callback secret is configured the URL also carries
//! `token = hex(HMAC-SHA256(secret, payment_ref))`, so a forged callback
//! for a guessed ref is rejected.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::CallbackFlow;

type HmacSha256 = Hmac<Sha256>;

/// Builds and verifies provider callback URLs.
#[derive(Clone)]
pub struct CallbackUrls {
    base_url: String,
    secret: Option<SecretString>,
}

impl CallbackUrls {
    pub fn new(base_url: impl Into<String>, secret: Option<SecretString>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, secret }
    }

    /// Result URL for a flow: `{base}/callbacks/mpesa/{flow}/{payment_ref}`.
    pub fn result_url(&self, flow: CallbackFlow, payment_ref: &str) -> String {
        self.with_token(
            format!("{}/callbacks/mpesa/{}/{}", self.base_url, flow, payment_ref),
            payment_ref,
        )
    }

    /// Queue timeout URL for B2C / B2B.
    pub fn timeout_url(&self, payment_ref: &str) -> String {
        self.with_token(
            format!("{}/callbacks/mpesa/timeout/{}", self.base_url, payment_ref),
            payment_ref,
        )
    }

    /// Checks the `token` query parameter of an inbound callback.
    ///
    /// Always passes when no secret is configured.
    pub fn verify(&self, payment_ref: &str, token: Option<&str>) -> bool {
        let Some(expected) = self.token_for(payment_ref) else {
            return true;
        };
        match token {
            Some(provided) => {
                provided.len() == expected.len()
                    && bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
            }
            None => false,
        }
    }

    pub fn token_for(&self, payment_ref: &str) -> Option<String> {
        let secret = self.secret.as_ref()?;
        let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()).ok()?;
        mac.update(payment_ref.as_bytes());
        Some(hex_encode(&mac.finalize().into_bytes()))
    }

    fn with_token(&self, url: String, payment_ref: &str) -> String {
        match self.token_for(payment_ref) {
            Some(token) => format!("{}?token={}", url, token),
            None => url,
        }
    }
}

impl std::fmt::Debug for CallbackUrls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackUrls")
            .field("base_url", &self.base_url)
            .field("signed", &self.secret.is_some())
            .finish()
    }
}

/// Lower-case hex encoding.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed() -> CallbackUrls {
        CallbackUrls::new(
            "https://pay.example.com/",
            Some(SecretString::new("cb-secret".to_string())),
        )
    }

    #[test]
    fn unsigned_urls_carry_no_token() {
        let urls = CallbackUrls::new("https://pay.example.com", None);
        assert_eq!(
            urls.result_url(CallbackFlow::Stk, "TX1"),
            "https://pay.example.com/callbacks/mpesa/stk/TX1"
        );
        assert_eq!(
            urls.timeout_url("TX1"),
            "https://pay.example.com/callbacks/mpesa/timeout/TX1"
        );
        assert!(urls.verify("TX1", None));
    }

    #[test]
    fn signed_urls_verify_their_own_token() {
        let urls = signed();
        let url = urls.result_url(CallbackFlow::B2c, "TX1");
        let token = url.split("?token=").nth(1).unwrap();

        assert!(url.starts_with("https://pay.example.com/callbacks/mpesa/b2c/TX1?token="));
        assert_eq!(token.len(), 64);
        assert!(urls.verify("TX1", Some(token)));
    }

    #[test]
    fn token_for_another_ref_is_rejected() {
        let urls = signed();
        let token = urls.token_for("TX1").unwrap();
        assert!(!urls.verify("TX2", Some(&token)));
        assert!(!urls.verify("TX1", None));
        assert!(!urls.verify("TX1", Some("deadbeef")));
    }

    #[test]
    fn hex_encode_bytes() {
        assert_eq!(hex_encode(&[0x00, 0xff, 0x10]), "00ff10");
    }
}
