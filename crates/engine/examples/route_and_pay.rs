//! Route and execute a payment against an in-process demo gateway.
//!
//! Run with: `cargo run -p payrail-engine --example route_and_pay`

use rust_decimal_macros::dec;

use payrail_client::{ClientError, Gateway, GatewayPaymentResponse, GatewayRefundResponse};
use payrail_core::{
    FeeBreakdown, PaymentIntent, PaymentMethod, PaymentStatus, RefundIntent, RegionCode,
    RegionInfo, RegionLimits, RegionQuote, RouterId, RoutingConfig, RoutingStrategy,
};
use payrail_engine::{PayOptions, QuoteOptions, RoutingEngine};

/// A gateway that quotes three regions and declines the cheapest one, so
/// the fallback loop is visible in the output.
struct DemoGateway;

impl Gateway for DemoGateway {
    async fn get_quotes(
        &self,
        _intent: &PaymentIntent,
        _regions: Option<&[RegionCode]>,
        _include_unavailable: bool,
    ) -> Result<Vec<RegionQuote>, ClientError> {
        Ok(vec![
            demo_quote("EU", dec!(0.80), 0.96),
            demo_quote("US", dec!(1.40), 0.99),
            demo_quote("SG", dec!(2.10), 0.93),
        ])
    }

    async fn execute_payment(
        &self,
        _intent: &PaymentIntent,
        region: &RegionCode,
        _router_id: &RouterId,
        idempotency_key: &str,
    ) -> Result<GatewayPaymentResponse, ClientError> {
        if region.as_str() == "EU" {
            return Err(ClientError::Status {
                status: 503,
                code: payrail_core::ErrorCode::ServiceUnavailable,
                message: "EU processor is draining connections".into(),
            });
        }
        Ok(GatewayPaymentResponse {
            status: PaymentStatus::Succeeded,
            provider_reference: Some(format!("ch_{idempotency_key}")),
        })
    }

    async fn execute_refund(
        &self,
        _refund: &RefundIntent,
        _region: &RegionCode,
        idempotency_key: &str,
    ) -> Result<GatewayRefundResponse, ClientError> {
        Ok(GatewayRefundResponse {
            status: PaymentStatus::Succeeded,
            provider_reference: Some(format!("re_{idempotency_key}")),
        })
    }

    async fn get_regions(&self) -> Result<Vec<RegionInfo>, ClientError> {
        Ok(vec![])
    }

    async fn health_check(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

fn demo_quote(region: &str, cost: rust_decimal::Decimal, success: f64) -> RegionQuote {
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
        latency_ms: Some(120.0),
        available: true,
        unavailable_reason: None,
        supported_methods: vec![],
        score: None,
        reasons: vec![],
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "payrail_engine=debug,info".into()),
        )
        .init();

    let engine = RoutingEngine::builder()
        .gateway(DemoGateway)
        .routing(RoutingConfig {
            strategy: RoutingStrategy::Balanced,
            ..RoutingConfig::default()
        })
        .build()?;

    let intent = PaymentIntent::new("pi-demo-1", dec!(42.00), "EUR", PaymentMethod::BankTransfer);

    let quotes = engine.quote(&intent, &QuoteOptions::default()).await?;
    println!("ranked candidates:");
    for quote in &quotes.quotes {
        println!(
            "  {:>3}  cost {:<5}  score {:.3}  [{}]",
            quote.region.as_str(),
            quote.total_cost,
            quote.score.unwrap_or_default(),
            quote.reasons.join("; "),
        );
    }

    let result = engine.pay(&intent, &PayOptions::default()).await?;
    println!(
        "\npaid {} {} through {} ({} attempt(s), reference {:?})",
        result.amount,
        result.currency,
        result.region_used,
        result.attempts.len(),
        result.provider_reference,
    );
    for attempt in &result.attempts {
        println!(
            "  attempt {} via {}: {:?}",
            attempt.attempt, attempt.region, attempt.outcome
        );
    }

    for (name, stats) in engine.circuit_stats() {
        println!(
            "\nbreaker {name}: state {} ({} recent failure(s))",
            stats.state, stats.recent_failures
        );
    }
    Ok(())
}
