//! HMAC signatures for payloads sent by the optional [`Forwarder`](crate::Forwarder).

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "x-signature";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Signs request bodies with HMAC-SHA256 so receivers can authenticate them.
#[derive(Clone)]
pub struct PayloadSigner {
    key: Vec<u8>,
}

impl PayloadSigner {
    /// Creates a signer with the given key.
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self {
            key: key.as_ref().to_vec(),
        }
    }

    /// Returns the header value for `payload`: `sha256=<hex digest>`.
    pub fn sign(&self, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(payload);
        format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
    }

    /// Verifies a header value produced by [`PayloadSigner::sign`].
    pub fn verify(&self, header: &str, payload: &[u8]) -> bool {
        header.starts_with(SIGNATURE_PREFIX) && constant_time_compare(&self.sign(payload), header)
    }
}

impl std::fmt::Debug for PayloadSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PayloadSigner(<redacted>)")
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
