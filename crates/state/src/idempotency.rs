//! Idempotency guard: at-most-once execution per logical request.
//!
//! Each key maps to a record holding the content hash of the request that
//! created it. A cached response is only ever replayed for a payload whose
//! hash matches — a differing hash under the same key is a hard conflict,
//! never a silent overwrite.

use std::future::Future;
use std::time::Duration;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use payrail_core::{ErrorCode, PaymentError, request_hash};

/// Lifecycle status of an idempotency record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyStatus {
    /// A call is (or was) in flight under this key.
    Processing,
    /// The call completed; its response is cached for replay.
    Completed,
    /// The call failed; a retry is allowed.
    Failed,
}

/// One record per idempotency key for the TTL window.
#[derive(Debug, Clone)]
struct IdempotencyRecord {
    request_hash: String,
    status: IdempotencyStatus,
    response: Option<serde_json::Value>,
    /// Processing lock deadline; past it an abandoned attempt may be retried.
    lock_expires_at: Instant,
    /// Record expiry, independent of status.
    expires_at: Instant,
}

impl IdempotencyRecord {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Outcome of checking a key against the guard.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// No live record blocks this request; the caller may proceed.
    Proceed,
    /// A completed record exists for the same payload; replay its response.
    Replay(serde_json::Value),
    /// A processing record holds an unexpired lock; do not retry yet.
    InProgress,
    /// A record exists under this key for a *different* payload.
    Conflict,
}

/// Configuration for the [`IdempotencyGuard`].
#[derive(Debug, Clone)]
pub struct IdempotencyConfig {
    /// How long records live, independent of status.
    pub record_ttl: Duration,
    /// How long a `Processing` record blocks concurrent retries.
    pub lock_ttl: Duration,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            record_ttl: Duration::from_secs(24 * 60 * 60),
            lock_ttl: Duration::from_secs(30),
        }
    }
}

/// Deduplicates concurrent and retried calls carrying the same idempotency
/// key.
///
/// Records transition `processing → completed | failed` and expire after a
/// configurable TTL. Expired records are lazily evicted on access; an
/// explicit [`sweep`](Self::sweep) is available for periodic cleanup.
#[derive(Debug, Default)]
pub struct IdempotencyGuard {
    records: DashMap<String, IdempotencyRecord>,
    config: IdempotencyConfig,
}

impl IdempotencyGuard {
    /// Create a guard with the given configuration.
    #[must_use]
    pub fn new(config: IdempotencyConfig) -> Self {
        Self {
            records: DashMap::new(),
            config,
        }
    }

    /// Check whether a request under `key` with `payload` may proceed.
    #[must_use]
    pub fn check(&self, key: &str, payload: &serde_json::Value) -> CheckOutcome {
        let hash = request_hash(payload);

        if let Some(record) = self.records.get(key) {
            if record.is_expired() {
                drop(record);
                self.records.remove(key);
                return CheckOutcome::Proceed;
            }
            if record.request_hash != hash {
                warn!(%key, "idempotency key reused with a different payload");
                return CheckOutcome::Conflict;
            }
            return match record.status {
                IdempotencyStatus::Completed => match &record.response {
                    Some(response) => CheckOutcome::Replay(response.clone()),
                    // Completed without a stored response should not occur;
                    // allow a retry rather than replaying nothing.
                    None => CheckOutcome::Proceed,
                },
                IdempotencyStatus::Failed => CheckOutcome::Proceed,
                IdempotencyStatus::Processing => {
                    if Instant::now() >= record.lock_expires_at {
                        // Previous attempt presumed abandoned.
                        CheckOutcome::Proceed
                    } else {
                        CheckOutcome::InProgress
                    }
                }
            };
        }

        CheckOutcome::Proceed
    }

    /// Mark `key` as processing for `payload`, taking the processing lock.
    pub fn start_processing(&self, key: impl Into<String>, payload: &serde_json::Value) {
        let now = Instant::now();
        self.records.insert(
            key.into(),
            IdempotencyRecord {
                request_hash: request_hash(payload),
                status: IdempotencyStatus::Processing,
                response: None,
                lock_expires_at: now + self.config.lock_ttl,
                expires_at: now + self.config.record_ttl,
            },
        );
    }

    /// Transition `key` to `Completed`, caching `response` for replay.
    pub fn complete(&self, key: &str, response: serde_json::Value) {
        if let Some(mut record) = self.records.get_mut(key) {
            record.status = IdempotencyStatus::Completed;
            record.response = Some(response);
        }
    }

    /// Transition `key` to `Failed`, allowing a later retry.
    pub fn fail(&self, key: &str) {
        if let Some(mut record) = self.records.get_mut(key) {
            record.status = IdempotencyStatus::Failed;
            record.response = None;
        }
    }

    /// Remove all expired records and return the count removed.
    pub fn sweep(&self) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired());
        let removed = before.saturating_sub(self.records.len());
        if removed > 0 {
            debug!(removed, "swept expired idempotency records");
        }
        removed
    }

    /// Number of live records (including expired ones not yet swept).
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the guard holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Wrap the full check → run → finalize sequence as one unit.
    ///
    /// - `Replay` returns the cached response deserialized as `T` without
    ///   invoking `f`.
    /// - `Conflict` and `InProgress` surface as their respective error
    ///   codes; they are never silently resolved.
    /// - Otherwise `f` runs under the processing lock; its success is cached
    ///   and returned, its failure recorded and propagated.
    pub async fn execute<T, F, Fut>(
        &self,
        key: &str,
        payload: &serde_json::Value,
        f: F,
    ) -> Result<T, PaymentError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, PaymentError>>,
    {
        match self.check(key, payload) {
            CheckOutcome::Conflict => Err(PaymentError::new(
                ErrorCode::IdempotencyConflict,
                format!("idempotency key {key} was used with a different payload"),
            )),
            CheckOutcome::InProgress => Err(PaymentError::new(
                ErrorCode::IdempotencyInProgress,
                format!("a request with idempotency key {key} is already in progress"),
            )),
            CheckOutcome::Replay(response) => {
                debug!(%key, "replaying cached idempotent response");
                serde_json::from_value(response).map_err(|e| {
                    PaymentError::new(
                        ErrorCode::InternalError,
                        format!("cached idempotent response is unreadable: {e}"),
                    )
                })
            }
            CheckOutcome::Proceed => {
                self.start_processing(key, payload);
                match f().await {
                    Ok(value) => {
                        let response = serde_json::to_value(&value).map_err(|e| {
                            PaymentError::new(
                                ErrorCode::InternalError,
                                format!("failed to serialize idempotent response: {e}"),
                            )
                        })?;
                        self.complete(key, response);
                        Ok(value)
                    }
                    Err(err) => {
                        self.fail(key);
                        Err(err)
                    }
                }
            }
        }
    }
}
