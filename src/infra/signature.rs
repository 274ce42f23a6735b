//! Request signatures used by the publishing client.
//!
//! The client sends a random nonce in `x-sharenote-nonce` and
//! `hex(HMAC-SHA256(key = secret, message = nonce))` in `x-sharenote-key`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const NONCE_HEADER: &str = "x-sharenote-nonce";
pub const KEY_HEADER: &str = "x-sharenote-key";

#[derive(Clone)]
pub struct RequestSigner {
    secret: String,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner").finish_non_exhaustive()
    }
}

impl RequestSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Lowercase hex signature of `nonce`.
    pub fn sign(&self, nonce: &str) -> Option<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(nonce.as_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    /// Constant-time comparison of the presented signature against `nonce`.
    pub fn verify(&self, nonce: &str, presented: &str) -> bool {
        if self.secret.is_empty() || nonce.is_empty() || presented.is_empty() {
            return false;
        }
        let Some(expected) = self.sign(nonce) else {
            return false;
        };
        let presented = presented.trim().to_ascii_lowercase();
        expected.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}
