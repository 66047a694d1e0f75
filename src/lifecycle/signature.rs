//! Webhook signature verification.
//!
//! The platform signs the raw request body with HMAC-SHA256 under the
//! shared webhook secret and sends the hex digest in `x-signature`.
//! Verification happens before any payload field is trusted.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub fn verify_signature(secret: &str, signature: &str, body: &[u8]) -> bool {
    let signature = signature.trim();
    if signature.is_empty() {
        return false;
    }
    let Ok(signature_bytes) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature_bytes).is_ok()
}

/// Hex digest for a body, used by clients and tests to sign payloads.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_round_trip() {
        let body = br#"{"type":"call.session_started"}"#;
        let signature = sign("secret", body);
        assert!(verify_signature("secret", &signature, body));
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let body = b"payload";
        let signature = sign("secret", body);
        assert!(!verify_signature("other", &signature, body));
    }

    #[test]
    fn test_rejects_tampered_body() {
        let signature = sign("secret", b"payload");
        assert!(!verify_signature("secret", &signature, b"payload2"));
    }

    #[test]
    fn test_rejects_garbage_signature() {
        assert!(!verify_signature("secret", "", b"payload"));
        assert!(!verify_signature("secret", "not-hex", b"payload"));
    }
}
