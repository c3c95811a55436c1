//! Payment executor: walks a route decision through the gateway with
//! fallback.
//!
//! Every attempt goes through the circuit breaker and gets its own derived
//! idempotency key (`"{base}-{attempt}"`), so a retry in a new region can
//! never replay a charge made by a previous attempt. Only retryable errors
//! advance the loop; terminal declines and an open circuit abort it with
//! the full attempts log attached.

use std::collections::HashSet;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use payrail_client::DynGateway;
use payrail_core::{
    AttemptOutcome, ErrorCode, FallbackConfig, PaymentAttempt, PaymentError, PaymentIntent,
    PaymentResult, RegionCode, RouteDecision, RouterId,
};

use crate::circuit_breaker::CircuitBreaker;

pub(crate) struct PaymentExecutor<'a> {
    gateway: &'a dyn DynGateway,
    breaker: &'a CircuitBreaker,
    fallback: &'a FallbackConfig,
}

impl<'a> PaymentExecutor<'a> {
    pub(crate) fn new(
        gateway: &'a dyn DynGateway,
        breaker: &'a CircuitBreaker,
        fallback: &'a FallbackConfig,
    ) -> Self {
        Self {
            gateway,
            breaker,
            fallback,
        }
    }

    /// Execute a decision, falling back through its alternatives.
    ///
    /// `no_fallback` caps the loop at a single attempt regardless of
    /// configuration. The returned result (or error) carries every attempt
    /// made, in order.
    #[instrument(skip_all, fields(intent.id = %intent.id, region = %decision.region))]
    pub(crate) async fn execute(
        &self,
        intent: &PaymentIntent,
        decision: &RouteDecision,
        base_key: &str,
        no_fallback: bool,
    ) -> Result<PaymentResult, PaymentError> {
        let max_attempts = if no_fallback || !self.fallback.enabled {
            1
        } else {
            self.fallback.max_tries.max(1)
        };

        let mut region = decision.region.clone();
        let mut router_id = decision.router_id.clone();
        let mut failed_regions: HashSet<RegionCode> = HashSet::new();
        let mut attempts: Vec<PaymentAttempt> = Vec::new();

        for attempt in 1..=max_attempts {
            let key = format!("{base_key}-{attempt}");
            let started_at = Utc::now();
            let timer = Instant::now();

            let result = self
                .breaker
                .execute(|| async {
                    self.gateway
                        .execute_payment(intent, &region, &router_id, &key)
                        .await
                        .map_err(PaymentError::from)
                })
                .await;

            let duration_ms =
                u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX);

            match result {
                Ok(response) => {
                    attempts.push(PaymentAttempt {
                        attempt,
                        region: region.clone(),
                        router_id: router_id.clone(),
                        outcome: AttemptOutcome::Succeeded,
                        error: None,
                        started_at,
                        duration_ms,
                    });
                    info!(%region, attempt, status = ?response.status, "payment executed");
                    return Ok(PaymentResult {
                        intent_id: intent.id.clone(),
                        status: response.status,
                        region_used: region,
                        router_used: router_id,
                        amount: intent.amount,
                        currency: intent.currency.clone(),
                        provider_reference: response.provider_reference,
                        attempts,
                        idempotency_key: base_key.to_owned(),
                    });
                }
                Err(err) => {
                    warn!(%region, attempt, code = %err.code, "payment attempt failed");
                    attempts.push(PaymentAttempt {
                        attempt,
                        region: region.clone(),
                        router_id: router_id.clone(),
                        outcome: AttemptOutcome::Failed,
                        error: Some(err.detail()),
                        started_at,
                        duration_ms,
                    });
                    failed_regions.insert(region.clone());

                    if !err.is_retryable() || attempt == max_attempts {
                        return Err(err.with_attempts(attempts));
                    }

                    match self.next_region(decision, &failed_regions) {
                        Some((next_region, next_router)) => {
                            let backoff = self.fallback.backoff * attempt;
                            info!(
                                from = %region,
                                to = %next_region,
                                backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                                "falling back to alternative region"
                            );
                            tokio::time::sleep(backoff).await;
                            region = next_region;
                            router_id = next_router;
                        }
                        None => return Err(err.with_attempts(attempts)),
                    }
                }
            }
        }

        // The loop always returns from its final iteration; reaching this
        // point means the bookkeeping above is broken.
        Err(PaymentError::new(
            ErrorCode::InternalError,
            "fallback loop exhausted without a terminal outcome",
        )
        .with_attempts(attempts))
    }

    /// First alternative whose region has not already failed this call.
    fn next_region(
        &self,
        decision: &RouteDecision,
        failed: &HashSet<RegionCode>,
    ) -> Option<(RegionCode, RouterId)> {
        decision
            .alternatives
            .iter()
            .find(|quote| !failed.contains(&quote.region))
            .map(|quote| (quote.region.clone(), quote.router_id.clone()))
    }
}
