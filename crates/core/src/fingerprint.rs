//! Fingerprint computation for quote caching and idempotency checks.
//!
//! Quote fingerprints key the quote cache: two intents that would produce
//! the same candidate set share a fingerprint. Request hashes bind an
//! idempotency key to the exact payload that created it.

use sha2::{Digest, Sha256};

use crate::intent::PaymentIntent;
use crate::types::RegionCode;

/// Compute the cache fingerprint for a quote request.
///
/// The fingerprint covers every input that can change the candidate set:
/// amount, currency, method, countries, and any caller-supplied region
/// override (order-sensitive, since the override is an allow-list).
/// The intent id is deliberately excluded so identical requests share a
/// cache entry.
#[must_use]
pub fn quote_fingerprint(intent: &PaymentIntent, regions: Option<&[RegionCode]>) -> String {
    let mut hasher = Sha256::new();

    for (field, value) in [
        ("amount", intent.amount.to_string()),
        ("currency", intent.currency.clone()),
        ("method", intent.method.as_str().to_owned()),
        ("user_country", intent.user_country.clone().unwrap_or_default()),
        (
            "merchant_country",
            intent.merchant_country.clone().unwrap_or_default(),
        ),
    ] {
        hasher.update(field.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b";");
    }

    if let Some(regions) = regions {
        hasher.update(b"regions=");
        for region in regions {
            hasher.update(region.as_bytes());
            hasher.update(b",");
        }
        hasher.update(b";");
    }

    hex::encode(hasher.finalize())
}

/// Compute the content hash binding an idempotency key to its payload.
///
/// Serialization of `serde_json::Value` maps is key-ordered, so two
/// structurally equal payloads hash identically.
#[must_use]
pub fn request_hash(payload: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
