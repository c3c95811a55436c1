//! The routing engine facade: quote, decide, pay, refund.
//!
//! Wires the leaf components together — quote cache, filter and scoring,
//! strategy decider, circuit breaker, idempotency guard, and the fallback
//! executor — behind one concurrency-safe handle. Construction goes through
//! [`EngineBuilder`](crate::builder::EngineBuilder).

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use payrail_client::{DynGateway, verify_webhook};
use payrail_core::{
    ComplianceConfig, ErrorCode, PaymentError, PaymentIntent, PaymentResult, QuoteResult,
    RefundIntent, RefundResult, RegionCode, RegionInfo, RegionQuote, RouteDecision, RoutingConfig,
    RoutingMode, quote_fingerprint,
};
use payrail_state::{CacheStats, IdempotencyGuard, QuoteCache};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerRegistry, CircuitStats};
use crate::error::EngineError;
use crate::executor::PaymentExecutor;
use crate::filter::filter_quotes;
use crate::{scoring, strategy};

/// Registry name of the breaker guarding the processor gateway.
pub const GATEWAY_DEPENDENCY: &str = "gateway";

/// Options for a quote call.
#[derive(Debug, Clone, Default)]
pub struct QuoteOptions {
    /// Bypass the quote cache and overwrite the cached entry.
    pub force_refresh: bool,
    /// Restrict quoting to these regions (forwarded to the gateway).
    pub regions: Option<Vec<RegionCode>>,
    /// Keep quotes for unavailable regions in the result, annotated with
    /// the reason they were filtered.
    pub include_unavailable: bool,
}

/// Options for a pay call.
#[derive(Debug, Clone, Default)]
pub struct PayOptions {
    /// Quote options used when resolving the route.
    pub quote: QuoteOptions,
    /// Skip the decider and force this region.
    pub region: Option<RegionCode>,
    /// Cap execution at a single attempt, overriding fallback config.
    pub no_fallback: bool,
    /// Caller-supplied idempotency key. Defaults to one derived from the
    /// intent id, so replaying the same intent replays the result.
    pub idempotency_key: Option<String>,
}

/// Options for a refund call.
#[derive(Debug, Clone, Default)]
pub struct RefundOptions {
    /// Region the original payment went through. Required.
    pub region: Option<RegionCode>,
    /// Caller-supplied idempotency key. Defaults to one derived from the
    /// refund id.
    pub idempotency_key: Option<String>,
}

/// Adaptive payment routing engine.
///
/// All methods take `&self`; the engine is designed to sit behind an `Arc`
/// and be shared across tasks.
pub struct RoutingEngine {
    pub(crate) gateway: Arc<dyn DynGateway>,
    pub(crate) routing: RoutingConfig,
    pub(crate) compliance: ComplianceConfig,
    pub(crate) cache: QuoteCache<QuoteResult>,
    pub(crate) idempotency: IdempotencyGuard,
    pub(crate) breakers: CircuitBreakerRegistry,
    pub(crate) webhook_secret: Option<Vec<u8>>,
}

impl RoutingEngine {
    /// Start building an engine.
    #[must_use]
    pub fn builder() -> crate::builder::EngineBuilder {
        crate::builder::EngineBuilder::new()
    }

    /// Fetch (or serve from cache) the ranked candidate set for an intent.
    ///
    /// The returned result carries `cache_hit` and one warning per quote
    /// the filter removed.
    #[instrument(skip_all, fields(intent.id = %intent.id))]
    pub async fn quote(
        &self,
        intent: &PaymentIntent,
        options: &QuoteOptions,
    ) -> Result<QuoteResult, EngineError> {
        intent.validate()?;
        self.check_compliance(intent)?;

        let fingerprint = quote_fingerprint(intent, options.regions.as_deref());
        if !options.force_refresh
            && let Some(mut hit) = self.cache.get(&fingerprint)
        {
            debug!(fingerprint = %&fingerprint[..12], "quote cache hit");
            hit.cache_hit = true;
            return Ok(hit);
        }

        let fresh = self.fetch_and_rank(intent, options).await?;
        self.cache
            .set(fingerprint, fresh.clone(), self.routing.quote_ttl);
        Ok(fresh)
    }

    /// Resolve a route decision for an intent.
    #[instrument(skip_all, fields(intent.id = %intent.id))]
    pub async fn decide_route(
        &self,
        intent: &PaymentIntent,
        options: &QuoteOptions,
    ) -> Result<RouteDecision, EngineError> {
        let quotes = self.quote(intent, options).await?;
        Ok(strategy::decide_route(intent, quotes, &self.routing)?)
    }

    /// Execute a payment end to end: decide, then run the fallback loop
    /// under the idempotency guard.
    ///
    /// In dry-run mode this returns [`EngineError::DryRun`] carrying the
    /// decision instead of touching the gateway.
    #[instrument(skip_all, fields(intent.id = %intent.id))]
    pub async fn pay(
        &self,
        intent: &PaymentIntent,
        options: &PayOptions,
    ) -> Result<PaymentResult, EngineError> {
        intent.validate()?;

        let decision = match &options.region {
            Some(region) => self.forced_decision(intent, region, &options.quote).await?,
            None => self.decide_route(intent, &options.quote).await?,
        };

        if self.routing.mode == RoutingMode::DryRun {
            debug!(region = %decision.region, "dry run, refusing to execute");
            return Err(EngineError::DryRun {
                decision: Box::new(decision),
            });
        }

        let base_key = options
            .idempotency_key
            .clone()
            .unwrap_or_else(|| format!("pay-{}", intent.id));
        let payload = serde_json::to_value(intent)
            .map_err(|e| PaymentError::new(ErrorCode::InternalError, e.to_string()))?;

        let breaker = self.gateway_breaker();
        let executor =
            PaymentExecutor::new(self.gateway.as_ref(), breaker, &self.routing.fallback);
        let result = self
            .idempotency
            .execute(&base_key, &payload, || {
                executor.execute(intent, &decision, &base_key, options.no_fallback)
            })
            .await?;
        Ok(result)
    }

    /// Execute a refund in the region the payment went through.
    #[instrument(skip_all, fields(refund.id = %refund.id))]
    pub async fn refund(
        &self,
        refund: &RefundIntent,
        options: &RefundOptions,
    ) -> Result<RefundResult, EngineError> {
        refund.validate()?;
        let Some(region) = options.region.clone() else {
            return Err(PaymentError::new(
                ErrorCode::MissingField,
                "refund requires the region of the original payment",
            )
            .into());
        };

        let base_key = options
            .idempotency_key
            .clone()
            .unwrap_or_else(|| format!("refund-{}", refund.id));
        let payload = serde_json::to_value(refund)
            .map_err(|e| PaymentError::new(ErrorCode::InternalError, e.to_string()))?;

        let breaker = self.gateway_breaker();
        let result = self
            .idempotency
            .execute(&base_key, &payload, || async {
                let response = breaker
                    .execute(|| async {
                        self.gateway
                            .execute_refund(refund, &region, &base_key)
                            .await
                            .map_err(PaymentError::from)
                    })
                    .await?;
                Ok(RefundResult {
                    refund_id: refund.id.clone(),
                    status: response.status,
                    region: region.clone(),
                    amount: refund.amount,
                    currency: refund.currency.clone(),
                    provider_reference: response.provider_reference,
                    idempotency_key: base_key.clone(),
                })
            })
            .await?;
        Ok(result)
    }

    /// List the regions the gateway can route to.
    pub async fn list_regions(&self) -> Result<Vec<RegionInfo>, EngineError> {
        let regions = self
            .gateway_breaker()
            .execute(|| async { self.gateway.get_regions().await.map_err(PaymentError::from) })
            .await?;
        Ok(regions)
    }

    /// Verify the gateway is reachable and credentials are accepted.
    pub async fn gateway_health(&self) -> Result<(), EngineError> {
        self.gateway_breaker()
            .execute(|| async { self.gateway.health_check().await.map_err(PaymentError::from) })
            .await?;
        Ok(())
    }

    /// Verify an incoming webhook signature.
    ///
    /// Returns `false` when no webhook secret is configured.
    #[must_use]
    pub fn verify_webhook(&self, payload: &str, signature: &str, timestamp: i64) -> bool {
        match &self.webhook_secret {
            Some(secret) => verify_webhook(
                secret,
                payload,
                signature,
                timestamp,
                payrail_client::DEFAULT_TOLERANCE,
            ),
            None => {
                warn!("webhook received but no webhook secret is configured");
                false
            }
        }
    }

    // -- Operational surface --------------------------------------------------

    /// Drop every cached quote result.
    pub fn clear_quote_cache(&self) {
        self.cache.clear();
    }

    /// Point-in-time quote cache statistics.
    #[must_use]
    pub fn quote_cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Remove expired idempotency records and return the count removed.
    pub fn sweep_idempotency(&self) -> usize {
        self.idempotency.sweep()
    }

    /// Number of live idempotency records.
    #[must_use]
    pub fn idempotency_len(&self) -> usize {
        self.idempotency.len()
    }

    /// Stats for every registered circuit breaker, sorted by dependency.
    #[must_use]
    pub fn circuit_stats(&self) -> Vec<(String, CircuitStats)> {
        self.breakers
            .dependencies()
            .into_iter()
            .filter_map(|name| {
                self.breakers
                    .get(name)
                    .map(|breaker| (name.to_owned(), breaker.stats()))
            })
            .collect()
    }

    /// Look up a registered circuit breaker.
    #[must_use]
    pub fn circuit_breaker(&self, dependency: &str) -> Option<&CircuitBreaker> {
        self.breakers.get(dependency)
    }

    /// Force a breaker open. Returns `false` for an unknown dependency.
    pub fn trip_circuit(&self, dependency: &str) -> bool {
        self.breakers
            .get(dependency)
            .map(|breaker| {
                breaker.trip();
            })
            .is_some()
    }

    /// Reset a breaker to closed. Returns `false` for an unknown dependency.
    pub fn reset_circuit(&self, dependency: &str) -> bool {
        self.breakers
            .get(dependency)
            .map(|breaker| {
                breaker.reset();
            })
            .is_some()
    }

    // -- Internals ------------------------------------------------------------

    fn gateway_breaker(&self) -> &CircuitBreaker {
        self.breakers
            .get(GATEWAY_DEPENDENCY)
            .expect("gateway breaker registered at construction")
    }

    /// Reject intents touching countries the merchant may not transact
    /// with, before any gateway call.
    fn check_compliance(&self, intent: &PaymentIntent) -> Result<(), PaymentError> {
        for country in [&intent.user_country, &intent.merchant_country]
            .into_iter()
            .flatten()
        {
            if self.compliance.blocked_countries.contains(country) {
                return Err(PaymentError::new(
                    ErrorCode::ComplianceRejected,
                    format!("transactions involving {country} are blocked"),
                ));
            }
        }
        Ok(())
    }

    /// Fetch quotes from the gateway (through the breaker), filter, and
    /// rank them.
    async fn fetch_and_rank(
        &self,
        intent: &PaymentIntent,
        options: &QuoteOptions,
    ) -> Result<QuoteResult, EngineError> {
        let raw = self
            .gateway_breaker()
            .execute(|| async {
                self.gateway
                    .get_quotes(
                        intent,
                        options.regions.as_deref(),
                        options.include_unavailable,
                    )
                    .await
                    .map_err(PaymentError::from)
            })
            .await?;

        let outcome = filter_quotes(raw, intent, &self.routing, &self.compliance);
        let warnings: Vec<String> = outcome
            .filtered
            .iter()
            .map(|f| format!("{} filtered: {}", f.quote.region, f.reason))
            .collect();

        let mut quotes = scoring::rank(
            outcome.passed,
            &self.routing.strategy,
            &self.routing.weights,
            Some(intent.amount),
        );
        let best = quotes.first().cloned();

        if options.include_unavailable {
            quotes.extend(outcome.filtered.into_iter().map(|f| {
                let mut quote: RegionQuote = f.quote;
                quote.reasons.push(format!("filtered: {}", f.reason));
                quote
            }));
        }

        debug!(
            candidates = quotes.len(),
            filtered = warnings.len(),
            "quotes ranked"
        );
        Ok(QuoteResult {
            intent_id: intent.id.clone(),
            quotes,
            best,
            cache_hit: false,
            generated_at: Utc::now(),
            warnings,
        })
    }

    /// Build a decision for a caller-forced region.
    ///
    /// The forced region must be admissible under the configured allow and
    /// block lists and must have an available quote; the remaining ranked
    /// quotes still serve as fallback alternatives.
    async fn forced_decision(
        &self,
        intent: &PaymentIntent,
        region: &RegionCode,
        options: &QuoteOptions,
    ) -> Result<RouteDecision, EngineError> {
        if self.compliance.sanctioned_regions.contains(region)
            || self.routing.blocked_regions.contains(region)
            || (!self.routing.allowed_regions.is_empty()
                && !self.routing.allowed_regions.contains(region))
        {
            return Err(PaymentError::new(
                ErrorCode::RegionNotAllowed,
                format!("region {region} is not admissible"),
            )
            .into());
        }

        let quote_result = self.quote(intent, options).await?;
        let Some(chosen) = quote_result
            .quotes
            .iter()
            .find(|q| &q.region == region && q.available)
            .cloned()
        else {
            return Err(PaymentError::new(
                ErrorCode::RegionNotFound,
                format!("region {region} has no available quote"),
            )
            .into());
        };

        let alternatives: Vec<RegionQuote> = quote_result
            .quotes
            .iter()
            .filter(|q| &q.region != region && q.available)
            .cloned()
            .collect();
        let reason = format!(
            "forced {} via {} (cost {}); {} alternative(s)",
            chosen.region,
            chosen.router_id,
            chosen.total_cost,
            alternatives.len(),
        );

        Ok(RouteDecision {
            region: chosen.region,
            router_id: chosen.router_id,
            alternatives,
            reason,
            strategy: "forced".to_owned(),
            quote_result,
        })
    }
}

impl std::fmt::Debug for RoutingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingEngine")
            .field("routing", &self.routing)
            .field("breakers", &self.breakers)
            .field("cached_quotes", &self.cache.len())
            .finish_non_exhaustive()
    }
}
