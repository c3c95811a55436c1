//! End-to-end tests for the routing engine facade: quoting, deciding,
//! paying with fallback, idempotent replay, breaker behaviour, and
//! webhook verification, all against an in-process scripted gateway.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sha2::Sha256;

use payrail_client::{ClientError, Gateway, GatewayPaymentResponse, GatewayRefundResponse};
use payrail_core::{
    AttemptOutcome, ComplianceConfig, ErrorCode, FeeBreakdown, PaymentIntent,
    PaymentMethod, PaymentStatus, RefundIntent, RegionCode, RegionInfo, RegionLimits, RegionQuote,
    RouterId, RoutingConfig, RoutingMode, RoutingStrategy,
};
use payrail_engine::{
    CircuitState, EngineError, GATEWAY_DEPENDENCY, PayOptions, QuoteOptions, RefundOptions,
    RoutingEngine,
};

// -- Scripted gateway ---------------------------------------------------------

struct TestGateway {
    quotes: Mutex<Vec<RegionQuote>>,
    payments: Mutex<VecDeque<Result<GatewayPaymentResponse, ClientError>>>,
    quote_calls: AtomicU32,
    payment_calls: AtomicU32,
}

impl TestGateway {
    fn new(quotes: Vec<RegionQuote>) -> Self {
        Self {
            quotes: Mutex::new(quotes),
            payments: Mutex::new(VecDeque::new()),
            quote_calls: AtomicU32::new(0),
            payment_calls: AtomicU32::new(0),
        }
    }

    fn script_payments(
        self,
        outcomes: Vec<Result<GatewayPaymentResponse, ClientError>>,
    ) -> Self {
        *self.payments.lock().unwrap() = outcomes.into();
        self
    }

    fn quote_calls(&self) -> u32 {
        self.quote_calls.load(Ordering::SeqCst)
    }

    fn payment_calls(&self) -> u32 {
        self.payment_calls.load(Ordering::SeqCst)
    }
}

impl Gateway for TestGateway {
    async fn get_quotes(
        &self,
        _intent: &PaymentIntent,
        regions: Option<&[RegionCode]>,
        _include_unavailable: bool,
    ) -> Result<Vec<RegionQuote>, ClientError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        let quotes = self.quotes.lock().unwrap().clone();
        Ok(match regions {
            Some(regions) => quotes
                .into_iter()
                .filter(|q| regions.contains(&q.region))
                .collect(),
            None => quotes,
        })
    }

    async fn execute_payment(
        &self,
        _intent: &PaymentIntent,
        _region: &RegionCode,
        _router_id: &RouterId,
        _idempotency_key: &str,
    ) -> Result<GatewayPaymentResponse, ClientError> {
        self.payment_calls.fetch_add(1, Ordering::SeqCst);
        self.payments
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(GatewayPaymentResponse {
                    status: PaymentStatus::Succeeded,
                    provider_reference: Some("ch_default".into()),
                })
            })
    }

    async fn execute_refund(
        &self,
        _refund: &RefundIntent,
        _region: &RegionCode,
        _idempotency_key: &str,
    ) -> Result<GatewayRefundResponse, ClientError> {
        Ok(GatewayRefundResponse {
            status: PaymentStatus::Succeeded,
            provider_reference: Some("re_1".into()),
        })
    }

    async fn get_regions(&self) -> Result<Vec<RegionInfo>, ClientError> {
        Ok(self
            .quotes
            .lock()
            .unwrap()
            .iter()
            .map(|q| RegionInfo {
                region: q.region.clone(),
                name: q.region.as_str().to_owned(),
                currencies: vec!["EUR".into()],
                methods: vec![PaymentMethod::BankTransfer],
                active: q.available,
            })
            .collect())
    }

    async fn health_check(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

// -- Fixtures -----------------------------------------------------------------

fn quote(region: &str, cost: Decimal, success: f64) -> RegionQuote {
    RegionQuote {
        region: region.into(),
        router_id: format!("rtr-{}-1", region.to_lowercase()).into(),
        total_cost: cost,
        fees: FeeBreakdown {
            fixed: cost,
            ..FeeBreakdown::default()
        },
        limits: RegionLimits {
            min: dec!(0.50),
            max: dec!(10000),
            remaining_daily: None,
        },
        success_rate: Some(success),
        latency_ms: Some(100.0),
        available: true,
        unavailable_reason: None,
        supported_methods: vec![],
        score: None,
        reasons: vec![],
    }
}

fn standard_quotes() -> Vec<RegionQuote> {
    vec![
        quote("EU", dec!(1.00), 0.97),
        quote("US", dec!(2.00), 0.99),
        quote("SG", dec!(3.00), 0.95),
    ]
}

fn cheapest_routing() -> RoutingConfig {
    RoutingConfig {
        strategy: RoutingStrategy::Cheapest,
        ..RoutingConfig::default()
    }
}

fn engine_with(gateway: TestGateway, routing: RoutingConfig) -> RoutingEngine {
    RoutingEngine::builder()
        .gateway(gateway)
        .routing(routing)
        .build()
        .unwrap()
}

fn intent(id: &str) -> PaymentIntent {
    PaymentIntent::new(id, dec!(25.00), "EUR", PaymentMethod::BankTransfer)
}

fn unavailable_response() -> Result<GatewayPaymentResponse, ClientError> {
    Err(ClientError::Status {
        status: 503,
        code: ErrorCode::ServiceUnavailable,
        message: "upstream unavailable".into(),
    })
}

fn payment_error(err: EngineError) -> payrail_core::PaymentError {
    match err {
        EngineError::Payment(err) => err,
        EngineError::DryRun { .. } => panic!("expected payment error, got dry run"),
    }
}

// -- Quoting ------------------------------------------------------------------

#[tokio::test]
async fn quote_ranks_and_caches() {
    let engine = engine_with(TestGateway::new(standard_quotes()), cheapest_routing());
    let intent = intent("pi-1");

    let first = engine.quote(&intent, &QuoteOptions::default()).await.unwrap();
    assert!(!first.cache_hit);
    assert_eq!(first.best.as_ref().unwrap().region.as_str(), "EU");
    assert_eq!(first.quotes.len(), 3);
    assert!(first.quotes[0].score.is_some());

    let second = engine.quote(&intent, &QuoteOptions::default()).await.unwrap();
    assert!(second.cache_hit);
    assert_eq!(second.best.as_ref().unwrap().region.as_str(), "EU");
}

#[tokio::test]
async fn quote_cache_is_keyed_by_fingerprint_not_intent_id() {
    let gateway = TestGateway::new(standard_quotes());
    let engine = engine_with(gateway, cheapest_routing());

    engine
        .quote(&intent("pi-1"), &QuoteOptions::default())
        .await
        .unwrap();
    // Different id, same parameters: shares the cached entry.
    let replay = engine
        .quote(&intent("pi-2"), &QuoteOptions::default())
        .await
        .unwrap();
    assert!(replay.cache_hit);
}

#[tokio::test]
async fn force_refresh_bypasses_cache() {
    let engine = engine_with(TestGateway::new(standard_quotes()), cheapest_routing());
    let intent = intent("pi-1");

    engine.quote(&intent, &QuoteOptions::default()).await.unwrap();
    let refreshed = engine
        .quote(
            &intent,
            &QuoteOptions {
                force_refresh: true,
                ..QuoteOptions::default()
            },
        )
        .await
        .unwrap();
    assert!(!refreshed.cache_hit);
}

#[tokio::test]
async fn clear_cache_forces_refetch() {
    let engine = engine_with(TestGateway::new(standard_quotes()), cheapest_routing());
    let intent = intent("pi-1");

    engine.quote(&intent, &QuoteOptions::default()).await.unwrap();
    assert_eq!(engine.quote_cache_stats().size, 1);
    engine.clear_quote_cache();
    assert_eq!(engine.quote_cache_stats().size, 0);

    let result = engine.quote(&intent, &QuoteOptions::default()).await.unwrap();
    assert!(!result.cache_hit);
}

#[tokio::test]
async fn region_override_restricts_candidates() {
    let engine = engine_with(TestGateway::new(standard_quotes()), cheapest_routing());
    let result = engine
        .quote(
            &intent("pi-1"),
            &QuoteOptions {
                regions: Some(vec!["US".into()]),
                ..QuoteOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(result.quotes.len(), 1);
    assert_eq!(result.best.as_ref().unwrap().region.as_str(), "US");
}

#[tokio::test]
async fn filtered_quotes_surface_as_warnings() {
    let mut quotes = standard_quotes();
    quotes[2].available = false;
    quotes[2].unavailable_reason = Some("maintenance".into());
    let engine = engine_with(TestGateway::new(quotes), cheapest_routing());

    let result = engine
        .quote(&intent("pi-1"), &QuoteOptions::default())
        .await
        .unwrap();
    assert_eq!(result.quotes.len(), 2);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("SG"));
    assert!(result.warnings[0].contains("region_unavailable"));
}

#[tokio::test]
async fn include_unavailable_keeps_filtered_quotes() {
    let mut quotes = standard_quotes();
    quotes[2].available = false;
    let engine = engine_with(TestGateway::new(quotes), cheapest_routing());

    let result = engine
        .quote(
            &intent("pi-1"),
            &QuoteOptions {
                include_unavailable: true,
                ..QuoteOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(result.quotes.len(), 3);
    let sg = result.quotes.iter().find(|q| q.region.as_str() == "SG").unwrap();
    assert!(sg.reasons.iter().any(|r| r.contains("region_unavailable")));
}

#[tokio::test]
async fn invalid_intent_rejected_before_gateway_call() {
    let gateway = TestGateway::new(standard_quotes());
    let engine = engine_with(gateway, cheapest_routing());
    let bad = PaymentIntent::new("pi-1", dec!(-5), "EUR", PaymentMethod::BankTransfer);

    let err = payment_error(engine.quote(&bad, &QuoteOptions::default()).await.unwrap_err());
    assert_eq!(err.code, ErrorCode::InvalidAmount);
}

#[tokio::test]
async fn blocked_country_rejected_by_compliance() {
    let engine = RoutingEngine::builder()
        .gateway(TestGateway::new(standard_quotes()))
        .compliance(ComplianceConfig {
            blocked_countries: vec!["KP".into()],
            ..ComplianceConfig::default()
        })
        .build()
        .unwrap();

    let blocked = intent("pi-1").with_user_country("KP");
    let err = payment_error(
        engine
            .quote(&blocked, &QuoteOptions::default())
            .await
            .unwrap_err(),
    );
    assert_eq!(err.code, ErrorCode::ComplianceRejected);
}

// -- Deciding -----------------------------------------------------------------

#[tokio::test]
async fn decide_route_commits_to_best_quote() {
    let engine = engine_with(TestGateway::new(standard_quotes()), cheapest_routing());
    let decision = engine
        .decide_route(&intent("pi-1"), &QuoteOptions::default())
        .await
        .unwrap();
    assert_eq!(decision.region.as_str(), "EU");
    assert_eq!(decision.alternatives.len(), 2);
    assert_eq!(decision.strategy, "cheapest");
}

#[tokio::test]
async fn pinned_mode_prefers_pinned_region() {
    let routing = RoutingConfig {
        mode: RoutingMode::Pinned("SG".into()),
        strategy: RoutingStrategy::Cheapest,
        ..RoutingConfig::default()
    };
    let engine = engine_with(TestGateway::new(standard_quotes()), routing);
    let decision = engine
        .decide_route(&intent("pi-1"), &QuoteOptions::default())
        .await
        .unwrap();
    assert_eq!(decision.region.as_str(), "SG");
    assert_eq!(decision.strategy, "pinned");
}

#[tokio::test]
async fn decide_route_with_no_candidates_fails() {
    let engine = engine_with(TestGateway::new(vec![]), cheapest_routing());
    let err = payment_error(
        engine
            .decide_route(&intent("pi-1"), &QuoteOptions::default())
            .await
            .unwrap_err(),
    );
    assert_eq!(err.code, ErrorCode::NoAvailableRegions);
}

// -- Paying -------------------------------------------------------------------

#[tokio::test]
async fn pay_happy_path() {
    let gateway = TestGateway::new(standard_quotes());
    let engine = engine_with(gateway, cheapest_routing());

    let result = engine
        .pay(&intent("pi-1"), &PayOptions::default())
        .await
        .unwrap();

    assert_eq!(result.status, PaymentStatus::Succeeded);
    assert_eq!(result.region_used.as_str(), "EU");
    assert_eq!(result.amount, dec!(25.00));
    assert_eq!(result.attempts.len(), 1);
    assert_eq!(result.idempotency_key, "pay-pi-1");
}

#[tokio::test(start_paused = true)]
async fn pay_falls_back_to_next_region() {
    let gateway = TestGateway::new(standard_quotes()).script_payments(vec![
        unavailable_response(),
        Ok(GatewayPaymentResponse {
            status: PaymentStatus::Succeeded,
            provider_reference: Some("ch_us".into()),
        }),
    ]);
    let engine = engine_with(gateway, cheapest_routing());

    let result = engine
        .pay(&intent("pi-1"), &PayOptions::default())
        .await
        .unwrap();

    assert_eq!(result.region_used.as_str(), "US");
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(result.attempts[0].outcome, AttemptOutcome::Failed);
    assert_eq!(result.attempts[0].region.as_str(), "EU");
    assert_eq!(result.attempts[1].outcome, AttemptOutcome::Succeeded);
}

#[tokio::test]
async fn pay_replays_result_for_same_idempotency_key() {
    let gateway = std::sync::Arc::new(TestGateway::new(standard_quotes()));
    let engine = RoutingEngine::builder()
        .gateway_arc(gateway.clone())
        .routing(cheapest_routing())
        .build()
        .unwrap();
    let intent = intent("pi-1");

    let first = engine.pay(&intent, &PayOptions::default()).await.unwrap();
    assert_eq!(gateway.payment_calls(), 1);

    // Same intent, same derived key: the stored result is replayed and the
    // gateway is never called again.
    let replay = engine.pay(&intent, &PayOptions::default()).await.unwrap();
    assert_eq!(gateway.payment_calls(), 1);
    assert_eq!(replay.idempotency_key, first.idempotency_key);
    assert_eq!(replay.region_used, first.region_used);
    assert_eq!(replay.provider_reference, first.provider_reference);
}

#[tokio::test]
async fn pay_conflicting_payload_under_same_key_rejected() {
    let engine = engine_with(TestGateway::new(standard_quotes()), cheapest_routing());
    let options = PayOptions {
        idempotency_key: Some("shared-key".into()),
        ..PayOptions::default()
    };

    engine.pay(&intent("pi-1"), &options).await.unwrap();

    let mut different = intent("pi-1");
    different.amount = dec!(99.00);
    let err = payment_error(engine.pay(&different, &options).await.unwrap_err());
    assert_eq!(err.code, ErrorCode::IdempotencyConflict);
}

#[tokio::test]
async fn pay_terminal_decline_carries_attempts() {
    let gateway = TestGateway::new(standard_quotes()).script_payments(vec![Err(
        ClientError::Status {
            status: 402,
            code: ErrorCode::PaymentDeclined,
            message: "card declined".into(),
        },
    )]);
    let engine = engine_with(gateway, cheapest_routing());

    let err = payment_error(
        engine
            .pay(&intent("pi-1"), &PayOptions::default())
            .await
            .unwrap_err(),
    );
    assert_eq!(err.code, ErrorCode::PaymentDeclined);
    assert_eq!(err.attempts.len(), 1);
    assert_eq!(err.attempts[0].region.as_str(), "EU");
}

#[tokio::test]
async fn pay_forced_region_skips_decider() {
    let gateway = TestGateway::new(standard_quotes());
    let engine = engine_with(gateway, cheapest_routing());

    let result = engine
        .pay(
            &intent("pi-1"),
            &PayOptions {
                region: Some("SG".into()),
                ..PayOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(result.region_used.as_str(), "SG");
}

#[tokio::test]
async fn pay_forced_unknown_region_fails() {
    let engine = engine_with(TestGateway::new(standard_quotes()), cheapest_routing());
    let err = payment_error(
        engine
            .pay(
                &intent("pi-1"),
                &PayOptions {
                    region: Some("MARS".into()),
                    ..PayOptions::default()
                },
            )
            .await
            .unwrap_err(),
    );
    assert_eq!(err.code, ErrorCode::RegionNotFound);
}

#[tokio::test]
async fn pay_forced_blocked_region_fails() {
    let routing = RoutingConfig {
        blocked_regions: vec!["SG".into()],
        strategy: RoutingStrategy::Cheapest,
        ..RoutingConfig::default()
    };
    let engine = engine_with(TestGateway::new(standard_quotes()), routing);
    let err = payment_error(
        engine
            .pay(
                &intent("pi-1"),
                &PayOptions {
                    region: Some("SG".into()),
                    ..PayOptions::default()
                },
            )
            .await
            .unwrap_err(),
    );
    assert_eq!(err.code, ErrorCode::RegionNotAllowed);
}

#[tokio::test]
async fn dry_run_reports_decision_without_executing() {
    let routing = RoutingConfig {
        mode: RoutingMode::DryRun,
        strategy: RoutingStrategy::Cheapest,
        ..RoutingConfig::default()
    };
    let gateway = TestGateway::new(standard_quotes());
    let engine = engine_with(gateway, routing);

    let err = engine
        .pay(&intent("pi-1"), &PayOptions::default())
        .await
        .unwrap_err();
    match err {
        EngineError::DryRun { decision } => {
            assert_eq!(decision.region.as_str(), "EU");
            assert_eq!(decision.alternatives.len(), 2);
        }
        EngineError::Payment(err) => panic!("expected dry run, got {err}"),
    }
    // Nothing was executed: the guard never saw the key.
    assert_eq!(engine.idempotency_len(), 0);
}

// -- Resilience ---------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn repeated_gateway_failures_open_the_circuit() {
    // Every payment attempt fails with a retryable error; the default
    // breaker threshold (5 failures in the window) trips during the
    // second pay call.
    let gateway = TestGateway::new(standard_quotes())
        .script_payments((0..8).map(|_| unavailable_response()).collect());
    let engine = engine_with(gateway, cheapest_routing());

    let err = payment_error(
        engine
            .pay(&intent("pi-1"), &PayOptions::default())
            .await
            .unwrap_err(),
    );
    assert_eq!(err.code, ErrorCode::ServiceUnavailable);
    assert_eq!(err.attempts.len(), 3);

    let err = payment_error(
        engine
            .pay(&intent("pi-2"), &PayOptions::default())
            .await
            .unwrap_err(),
    );
    // Attempt 1 fails (failure #4), attempt 2 fails (#5, circuit opens),
    // attempt 3 short-circuits.
    assert_eq!(err.code, ErrorCode::CircuitOpen);
    assert_eq!(err.attempts.len(), 3);

    let stats = engine.circuit_stats();
    let (name, gateway_stats) = &stats[0];
    assert_eq!(name, GATEWAY_DEPENDENCY);
    assert_eq!(gateway_stats.state, CircuitState::Open);

    // Even quoting is short-circuited while open (fresh fingerprint).
    let err = payment_error(
        engine
            .quote(
                &PaymentIntent::new("pi-3", dec!(7.77), "EUR", PaymentMethod::BankTransfer),
                &QuoteOptions::default(),
            )
            .await
            .unwrap_err(),
    );
    assert_eq!(err.code, ErrorCode::CircuitOpen);
}

#[tokio::test]
async fn manual_trip_and_reset() {
    let engine = engine_with(TestGateway::new(standard_quotes()), cheapest_routing());

    assert!(engine.trip_circuit(GATEWAY_DEPENDENCY));
    let err = payment_error(
        engine
            .pay(&intent("pi-1"), &PayOptions::default())
            .await
            .unwrap_err(),
    );
    assert_eq!(err.code, ErrorCode::CircuitOpen);

    assert!(engine.reset_circuit(GATEWAY_DEPENDENCY));
    engine
        .pay(&intent("pi-1"), &PayOptions::default())
        .await
        .unwrap();

    assert!(!engine.trip_circuit("unknown"));
    assert!(!engine.reset_circuit("unknown"));
}

// -- Refunds ------------------------------------------------------------------

#[tokio::test]
async fn refund_requires_region() {
    let engine = engine_with(TestGateway::new(standard_quotes()), cheapest_routing());
    let refund = RefundIntent::new("rf-1", "ch_1", dec!(10.00), "EUR");

    let err = payment_error(
        engine
            .refund(&refund, &RefundOptions::default())
            .await
            .unwrap_err(),
    );
    assert_eq!(err.code, ErrorCode::MissingField);
}

#[tokio::test]
async fn refund_happy_path() {
    let engine = engine_with(TestGateway::new(standard_quotes()), cheapest_routing());
    let refund = RefundIntent::new("rf-1", "ch_1", dec!(10.00), "EUR");

    let result = engine
        .refund(
            &refund,
            &RefundOptions {
                region: Some("EU".into()),
                ..RefundOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(result.status, PaymentStatus::Succeeded);
    assert_eq!(result.region.as_str(), "EU");
    assert_eq!(result.idempotency_key, "refund-rf-1");
}

// -- Regions & health ---------------------------------------------------------

#[tokio::test]
async fn list_regions_passes_through() {
    let engine = engine_with(TestGateway::new(standard_quotes()), cheapest_routing());
    let regions = engine.list_regions().await.unwrap();
    assert_eq!(regions.len(), 3);
}

#[tokio::test]
async fn gateway_health_passes_through() {
    let engine = engine_with(TestGateway::new(standard_quotes()), cheapest_routing());
    engine.gateway_health().await.unwrap();
}

// -- Webhooks -----------------------------------------------------------------

#[tokio::test]
async fn webhook_verification_round_trip() {
    let secret = b"whsec_test";
    let engine = RoutingEngine::builder()
        .gateway(TestGateway::new(standard_quotes()))
        .webhook_secret(secret.as_slice())
        .build()
        .unwrap();

    let payload = r#"{"event":"payment.succeeded","intent":"pi-1"}"#;
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).unwrap();
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    assert!(engine.verify_webhook(payload, &signature, timestamp));
    assert!(!engine.verify_webhook(r#"{"event":"tampered"}"#, &signature, timestamp));
    assert!(!engine.verify_webhook(payload, &signature, timestamp - 600));
}
