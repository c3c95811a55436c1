//! Incoming webhook signature verification.
//!
//! The gateway signs webhook deliveries with HMAC-SHA256 over
//! `"{timestamp}.{payload}"`. Verification rejects timestamps outside the
//! tolerance window and compares signatures in constant time.

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Default tolerance for webhook timestamp skew.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(5 * 60);

/// Verify a webhook signature against the shared secret.
///
/// `signature` is the hex-encoded HMAC the gateway attached; `timestamp` is
/// the Unix-seconds value it signed. Returns `false` (never an error) on
/// skewed timestamps, malformed signatures, or mismatches.
#[must_use]
pub fn verify_webhook(
    secret: &[u8],
    payload: &str,
    signature: &str,
    timestamp: i64,
    tolerance: Duration,
) -> bool {
    verify_webhook_at(
        secret,
        payload,
        signature,
        timestamp,
        tolerance,
        chrono::Utc::now().timestamp(),
    )
}

/// Verification core with an injectable clock, for deterministic tests.
#[must_use]
pub(crate) fn verify_webhook_at(
    secret: &[u8],
    payload: &str,
    signature: &str,
    timestamp: i64,
    tolerance: Duration,
    now: i64,
) -> bool {
    #[allow(clippy::cast_possible_wrap)]
    let tolerance_secs = tolerance.as_secs() as i64;
    if (now - timestamp).abs() > tolerance_secs {
        debug!(timestamp, now, "webhook timestamp outside tolerance window");
        return false;
    }

    let Ok(provided) = hex::decode(signature) else {
        return false;
    };

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key size");
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    let expected = mac.finalize().into_bytes();

    expected.ct_eq(provided.as_slice()).into()
}
