//! Webhook request signing: HMAC-SHA256 over the exact outbound body bytes.
//!
//! Header value format is `sha256=<lowercase hex digest>`, sent as `X-Hub-Signature`.

use crate::error::ConnectorError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Keyed signer built once from the shared secret.
#[derive(Clone)]
pub struct Signer {
    mac: HmacSha256,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

impl Signer {
    /// Key the signer with the secret's raw UTF-8 bytes. An empty secret is a configuration error.
    pub fn new(secret: &str) -> Result<Self, ConnectorError> {
        if secret.is_empty() {
            return Err(ConnectorError::InvalidSecret);
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| ConnectorError::InvalidSecret)?;
        Ok(Self { mac })
    }

    /// Lowercase hex HMAC of `body`.
    pub fn digest_hex(&self, body: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Header value for `body`: `sha256=` followed by the hex digest.
    pub fn sign(&self, body: &[u8]) -> String {
        format!("{}{}", SIGNATURE_PREFIX, self.digest_hex(body))
    }
}

/// One-shot form of [`Signer::sign`].
pub fn sign(body: &[u8], secret: &str) -> Result<String, ConnectorError> {
    Ok(Signer::new(secret)?.sign(body))
}
