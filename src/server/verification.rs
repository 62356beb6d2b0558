use crate::error::{Result, TollgateError};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the relay's signature of the request body.
pub const SIGNATURE_HEADER: &str = "x-tollgate-signature";

/// Verifies that a relayed event came from the trusted gateway relay.
#[async_trait]
pub trait RelayVerifier: Send + Sync {
    /// `Ok(true)` if the signature is valid, `Ok(false)` if missing or
    /// invalid.
    async fn verify_signature(&self, payload: &[u8], signature: Option<&str>) -> Result<bool>;
}

/// Accepts every request.
///
/// Only suitable when the relay endpoint is not reachable from outside.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVerification;

#[async_trait]
impl RelayVerifier for NoVerification {
    async fn verify_signature(&self, _payload: &[u8], _signature: Option<&str>) -> Result<bool> {
        Ok(true)
    }
}

/// HMAC-SHA256 over the raw body, hex encoded, optionally prefixed with
/// `sha256=`.
pub struct HmacSha256Verifier {
    secret: SecretString,
}

impl HmacSha256Verifier {
    pub fn new(secret: impl Into<SecretString>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn compute_signature(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| TollgateError::internal(format!("invalid HMAC key: {}", e)))?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Hex signature for `payload`, as the relay sends it.
    pub fn sign(&self, payload: &[u8]) -> Result<String> {
        Ok(hex_encode(&self.compute_signature(payload)?))
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }

    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// Constant-time comparison so the signature cannot be guessed byte by byte.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[async_trait]
impl RelayVerifier for HmacSha256Verifier {
    async fn verify_signature(&self, payload: &[u8], signature: Option<&str>) -> Result<bool> {
        let Some(signature) = signature else {
            tracing::debug!("Relay request without signature");
            return Ok(false);
        };

        let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
        let provided = match hex_decode(signature) {
            Some(bytes) => bytes,
            None => {
                tracing::debug!("Failed to decode relay signature");
                return Ok(false);
            }
        };

        let expected = self.compute_signature(payload)?;
        let is_valid = constant_time_compare(&expected, &provided);
        if !is_valid {
            tracing::debug!("Relay signature verification failed");
        }
        Ok(is_valid)
    }
}
