//! Signed download tokens.
//!
//! File downloads are authorized by a stateless HMAC token carried in
//! the query string: `exp` (unix seconds), `nonce` (12 random bytes,
//! hex) and `sig = HMAC-SHA256(secret, file_id|exp|nonce)` in hex.
//! Tokens are replayable until expiry; the nonce only makes issued
//! URLs distinct. Verification failures are never detailed to callers.

use std::time::Duration;

use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;

use crate::clock;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_DOWNLOAD_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("signature mismatch")]
    InvalidSignature,
}

/// Issued token parameters, ready to append to a download URL.
#[derive(Debug, Clone, Serialize)]
pub struct SignedDownload {
    pub exp: i64,
    pub nonce: String,
    pub sig: String,
}

impl SignedDownload {
    pub fn query_string(&self) -> String {
        format!("exp={}&nonce={}&sig={}", self.exp, self.nonce, self.sig)
    }
}

#[derive(Clone)]
pub struct DownloadSigner {
    secret: Vec<u8>,
}

impl DownloadSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn sign(&self, file_id: &str, exp: i64, nonce: &str) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(file_id.as_bytes());
        mac.update(b"|");
        mac.update(exp.to_string().as_bytes());
        mac.update(b"|");
        mac.update(nonce.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    /// Issues a token for `file_id` valid for `ttl` from now.
    pub fn issue(&self, file_id: &str, ttl: Duration) -> SignedDownload {
        let exp = clock::now_ts() + ttl.as_secs() as i64;
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = hex::encode(nonce_bytes);
        let sig = hex::encode(self.sign(file_id, exp, &nonce));
        SignedDownload { exp, nonce, sig }
    }

    /// Verifies a presented token. The error split (expired vs forged)
    /// is for internal logging only; callers must surface a single
    /// generic failure.
    pub fn verify(
        &self,
        file_id: &str,
        exp: i64,
        nonce: &str,
        sig: &str,
    ) -> Result<(), TokenError> {
        if clock::now_ts() > exp {
            return Err(TokenError::Expired);
        }
        let presented = hex::decode(sig).map_err(|_| TokenError::InvalidSignature)?;
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(file_id.as_bytes());
        mac.update(b"|");
        mac.update(exp.to_string().as_bytes());
        mac.update(b"|");
        mac.update(nonce.as_bytes());
        // constant-time comparison
        mac.verify_slice(&presented)
            .map_err(|_| TokenError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> DownloadSigner {
        DownloadSigner::new(b"test-secret".to_vec())
    }

    #[test]
    fn test_issue_and_verify() {
        let s = signer();
        let token = s.issue("fil_abc", DEFAULT_DOWNLOAD_TTL);
        assert_eq!(token.nonce.len(), 24);
        assert!(token.exp > clock::now_ts());
        s.verify("fil_abc", token.exp, &token.nonce, &token.sig)
            .unwrap();
    }

    #[test]
    fn test_verify_rejects_expired() {
        let s = signer();
        let exp = clock::now_ts() - 1;
        let sig = hex::encode(s.sign("fil_abc", exp, "00"));
        assert!(matches!(
            s.verify("fil_abc", exp, "00", &sig),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_verify_rejects_tampered_file_id() {
        let s = signer();
        let token = s.issue("fil_abc", DEFAULT_DOWNLOAD_TTL);
        assert!(matches!(
            s.verify("fil_other", token.exp, &token.nonce, &token.sig),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_verify_rejects_tampered_exp() {
        let s = signer();
        let token = s.issue("fil_abc", DEFAULT_DOWNLOAD_TTL);
        assert!(matches!(
            s.verify("fil_abc", token.exp + 3600, &token.nonce, &token.sig),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let token = signer().issue("fil_abc", DEFAULT_DOWNLOAD_TTL);
        let other = DownloadSigner::new(b"other-secret".to_vec());
        assert!(other
            .verify("fil_abc", token.exp, &token.nonce, &token.sig)
            .is_err());
    }

    #[test]
    fn test_verify_rejects_non_hex_sig() {
        let s = signer();
        let token = s.issue("fil_abc", DEFAULT_DOWNLOAD_TTL);
        assert!(s
            .verify("fil_abc", token.exp, &token.nonce, "not-hex!")
            .is_err());
    }

    #[test]
    fn test_query_string_shape() {
        let token = signer().issue("fil_abc", DEFAULT_DOWNLOAD_TTL);
        let qs = token.query_string();
        assert!(qs.starts_with(&format!("exp={}&nonce=", token.exp)));
        assert!(qs.ends_with(&format!("&sig={}", token.sig)));
    }
}
