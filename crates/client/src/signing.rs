//! Request signing for gateway calls.
//!
//! Every outbound request is signed with HMAC-SHA256 over a canonical
//! message covering the method, path, timestamp, nonce, and body hash.
//! Fields are newline-separated so no field can bleed into the next.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// A computed request signature and the values that must accompany it.
#[derive(Debug, Clone)]
pub struct RequestSignature {
    /// Hex-encoded HMAC-SHA256 signature.
    pub signature: String,
    /// Unix timestamp (seconds) the signature was computed at.
    pub timestamp: i64,
    /// Unique nonce bound into the signature.
    pub nonce: String,
}

/// Sign a request with the given secret.
///
/// The signed message is
/// `"{METHOD}\n{path}\n{timestamp}\n{nonce}\n{hex(sha256(body))}"`.
#[must_use]
pub fn sign_request(
    secret: &[u8],
    method: &str,
    path: &str,
    timestamp: i64,
    nonce: &str,
    body: &[u8],
) -> String {
    let body_hash = hex::encode(Sha256::digest(body));
    let message = format!(
        "{}\n{}\n{}\n{}\n{}",
        method.to_ascii_uppercase(),
        path,
        timestamp,
        nonce,
        body_hash,
    );
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Compute a fresh signature for a request happening now.
#[must_use]
pub fn sign_now(secret: &[u8], method: &str, path: &str, body: &[u8]) -> RequestSignature {
    let timestamp = chrono::Utc::now().timestamp();
    let nonce = uuid::Uuid::new_v4().to_string();
    let signature = sign_request(secret, method, path, timestamp, &nonce, body);
    RequestSignature {
        signature,
        timestamp,
        nonce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-signing-secret";

    #[test]
    fn signature_is_deterministic() {
        let a = sign_request(SECRET, "POST", "/v1/payments", 1_700_000_000, "n-1", b"{}");
        let b = sign_request(SECRET, "POST", "/v1/payments", 1_700_000_000, "n-1", b"{}");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn method_is_canonicalized_to_uppercase() {
        let lower = sign_request(SECRET, "post", "/v1/payments", 1, "n", b"");
        let upper = sign_request(SECRET, "POST", "/v1/payments", 1, "n", b"");
        assert_eq!(lower, upper);
    }

    #[test]
    fn any_field_change_alters_signature() {
        let base = sign_request(SECRET, "POST", "/v1/payments", 1, "n", b"{}");
        assert_ne!(base, sign_request(SECRET, "GET", "/v1/payments", 1, "n", b"{}"));
        assert_ne!(base, sign_request(SECRET, "POST", "/v1/refunds", 1, "n", b"{}"));
        assert_ne!(base, sign_request(SECRET, "POST", "/v1/payments", 2, "n", b"{}"));
        assert_ne!(base, sign_request(SECRET, "POST", "/v1/payments", 1, "m", b"{}"));
        assert_ne!(base, sign_request(SECRET, "POST", "/v1/payments", 1, "n", b"[]"));
    }

    #[test]
    fn different_secret_different_signature() {
        let a = sign_request(b"secret-a", "POST", "/p", 1, "n", b"");
        let b = sign_request(b"secret-b", "POST", "/p", 1, "n", b"");
        assert_ne!(a, b);
    }

    #[test]
    fn sign_now_produces_unique_nonces() {
        let a = sign_now(SECRET, "GET", "/v1/regions", b"");
        let b = sign_now(SECRET, "GET", "/v1/regions", b"");
        assert_ne!(a.nonce, b.nonce);
    }
}
