//! HMAC-SHA256 verification of webhook bodies.
//!
//! Shopify signs the exact request bytes with the app's shared secret and
//! sends the base64 digest in `X-Shopify-Hmac-Sha256`. The digest must be
//! computed over the raw body: re-serializing parsed JSON does not
//! reproduce the same bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Base64 HMAC-SHA256 of `raw_body` under `secret`.
#[must_use]
pub fn sign(raw_body: &[u8], secret: &str) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(raw_body);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// `true` only when both a digest and a secret are present and the digest
/// matches `raw_body`. Never panics.
#[must_use]
pub fn verify(raw_body: &[u8], provided_digest: Option<&str>, secret: Option<&str>) -> bool {
    let (Some(provided), Some(secret)) = (provided_digest, secret) else {
        return false;
    };
    if provided.is_empty() || secret.is_empty() {
        return false;
    }
    let expected = sign(raw_body, secret);
    bool::from(expected.as_bytes().ct_eq(provided.as_bytes()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    Invalid,
    /// No secret is configured. The request is let through, with a warning.
    Unverified,
}

impl SignatureCheck {
    #[must_use]
    pub fn is_accepted(self) -> bool {
        !matches!(self, Self::Invalid)
    }
}

/// Verifier bound to the deployment's webhook secret.
///
/// Without a secret every check returns [`SignatureCheck::Unverified`] and
/// logs a warning. Configuration refuses to start production without one.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Option<String>,
}

impl WebhookVerifier {
    #[must_use]
    pub fn new(secret: Option<String>) -> Self {
        let secret = secret.filter(|s| !s.is_empty());
        if secret.is_none() {
            tracing::warn!("no webhook secret configured; signatures will not be verified");
        }
        Self { secret }
    }

    #[must_use]
    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    #[must_use]
    pub fn check(&self, raw_body: &[u8], provided_digest: Option<&str>) -> SignatureCheck {
        match self.secret.as_deref() {
            None => {
                tracing::warn!("accepting webhook without signature verification");
                SignatureCheck::Unverified
            }
            Some(secret) if verify(raw_body, provided_digest, Some(secret)) => {
                SignatureCheck::Valid
            }
            Some(_) => SignatureCheck::Invalid,
        }
    }
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &self.secret.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "hush";
    const BODY: &[u8] = br#"{"id":1010101,"total_price":"99.00"}"#;

    #[test]
    fn sign_matches_known_digest() {
        // RFC 4231 test case 2: key "Jefe", data "what do ya want for nothing?".
        assert_eq!(
            sign(b"what do ya want for nothing?", "Jefe"),
            "W9zBRr9gdU5qBCQmCJV1x1oAPwidJzmDnexYuWTsOEM="
        );
    }

    #[test]
    fn accepts_digest_of_exact_bytes() {
        let digest = sign(BODY, SECRET);
        assert!(verify(BODY, Some(&digest), Some(SECRET)));
    }

    #[test]
    fn rejects_tampered_body() {
        let digest = sign(BODY, SECRET);
        let tampered = br#"{"id":1010101,"total_price":"0.01"}"#;
        assert!(!verify(tampered, Some(&digest), Some(SECRET)));
    }

    #[test]
    fn rejects_reserialized_body() {
        let digest = sign(BODY, SECRET);
        let value: serde_json::Value = serde_json::from_slice(BODY).unwrap();
        let pretty = serde_json::to_vec_pretty(&value).unwrap();
        assert!(!verify(&pretty, Some(&digest), Some(SECRET)));
    }

    #[test]
    fn missing_digest_or_secret_is_false() {
        let digest = sign(BODY, SECRET);
        assert!(!verify(BODY, None, Some(SECRET)));
        assert!(!verify(BODY, Some(&digest), None));
        assert!(!verify(BODY, Some(""), Some(SECRET)));
        assert!(!verify(BODY, Some(&digest), Some("")));
    }

    #[test]
    fn wrong_secret_is_false() {
        let digest = sign(BODY, "other");
        assert!(!verify(BODY, Some(&digest), Some(SECRET)));
    }

    #[test]
    fn verifier_without_secret_is_unverified_not_valid() {
        let verifier = WebhookVerifier::new(None);
        let check = verifier.check(BODY, None);
        assert_eq!(check, SignatureCheck::Unverified);
        assert!(check.is_accepted());
        assert!(!verifier.has_secret());
    }

    #[test]
    fn verifier_with_secret_checks_digest() {
        let verifier = WebhookVerifier::new(Some(SECRET.to_owned()));
        assert_eq!(
            verifier.check(BODY, Some(&sign(BODY, SECRET))),
            SignatureCheck::Valid
        );
        assert_eq!(verifier.check(BODY, Some("bogus")), SignatureCheck::Invalid);
        assert_eq!(verifier.check(BODY, None), SignatureCheck::Invalid);
        assert!(!SignatureCheck::Invalid.is_accepted());
    }

    #[test]
    fn debug_redacts_secret() {
        let verifier = WebhookVerifier::new(Some(SECRET.to_owned()));
        assert!(!format!("{verifier:?}").contains(SECRET));
    }
}
