//! GitHub webhook signature verification (`X-Hub-Signature-256`).

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header value prefix GitHub puts in front of the hex digest.
pub const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Webhook secret must not be empty")]
    EmptySecret,

    #[error("Webhook secret rejected as HMAC key")]
    InvalidKey,
}

/// Verifies HMAC-SHA256 signatures computed over raw request bodies.
#[derive(Clone)]
pub struct SignatureVerifier {
    mac: HmacSha256,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, SignatureError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(SignatureError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(&secret).map_err(|_| SignatureError::InvalidKey)?;
        Ok(Self { mac })
    }

    /// Compute the header value for `body`: `sha256=<lowercase hex>`.
    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(body);
        format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
    }

    /// Check `header` against the body bytes exactly as received.
    ///
    /// A missing or empty header, a missing `sha256=` prefix, or a digest that
    /// is not valid hex are all invalid. The digest comparison is constant time.
    pub fn verify(&self, body: &[u8], header: Option<&str>) -> bool {
        let Some(header) = header else {
            return false;
        };
        let Some(hex_digest) = header.trim().strip_prefix(SIGNATURE_PREFIX) else {
            return false;
        };
        if hex_digest.is_empty() {
            return false;
        }
        let Ok(claimed) = hex::decode(hex_digest) else {
            return false;
        };

        let mut mac = self.mac.clone();
        mac.update(body);
        mac.verify_slice(&claimed).is_ok()
    }
}
