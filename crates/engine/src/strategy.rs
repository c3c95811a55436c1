//! Strategy decider: turns a quote result into a single route decision.
//!
//! The decider consumes ranked quotes and commits to one region plus an
//! ordered fallback list. It never talks to the gateway; dry-run handling
//! lives in the engine facade, which computes the decision here and then
//! refuses to execute it.

use tracing::{debug, instrument};

use payrail_core::{
    ErrorCode, PaymentError, PaymentIntent, QuoteResult, RegionQuote, RouteDecision, RoutingConfig,
    RoutingMode,
};

use crate::scoring;

/// Decide the route for an intent from its quote result.
///
/// Only available quotes are eligible. In `Pinned` mode the pinned region
/// wins whenever it has an available quote and the rest become fallback
/// alternatives; a pinned region with no available quote falls through to
/// auto selection. Returns `NO_AVAILABLE_REGIONS` when nothing is eligible.
#[instrument(skip_all, fields(intent.id = %intent.id))]
pub fn decide_route(
    intent: &PaymentIntent,
    quote_result: QuoteResult,
    routing: &RoutingConfig,
) -> Result<RouteDecision, PaymentError> {
    let candidates: Vec<RegionQuote> = quote_result
        .quotes
        .iter()
        .filter(|q| q.available)
        .cloned()
        .collect();
    let ranked = scoring::rank(
        candidates,
        &routing.strategy,
        &routing.weights,
        Some(intent.amount),
    );
    if ranked.is_empty() {
        return Err(PaymentError::new(
            ErrorCode::NoAvailableRegions,
            format!("no available regions for intent {}", intent.id),
        ));
    }

    let (chosen_index, strategy) = match &routing.mode {
        RoutingMode::Pinned(region) => match ranked.iter().position(|q| &q.region == region) {
            Some(index) => (index, "pinned".to_owned()),
            // Pinned region has no available quote: fall through to auto.
            None => (0, routing.strategy.name().to_owned()),
        },
        RoutingMode::Auto | RoutingMode::DryRun => (0, routing.strategy.name().to_owned()),
    };

    let chosen = ranked[chosen_index].clone();
    let alternatives: Vec<RegionQuote> = ranked
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != chosen_index)
        .map(|(_, q)| q.clone())
        .collect();

    let reason = summarize(&chosen, alternatives.len(), &strategy);
    debug!(region = %chosen.region, %strategy, "route decided");

    let mut quote_result = quote_result;
    quote_result.best = Some(chosen.clone());
    quote_result.quotes = ranked;

    Ok(RouteDecision {
        region: chosen.region,
        router_id: chosen.router_id,
        alternatives,
        reason,
        strategy,
        quote_result,
    })
}

/// Deterministic summary built solely from the decision's own fields.
fn summarize(chosen: &RegionQuote, alternative_count: usize, strategy: &str) -> String {
    let score = chosen
        .score
        .map_or_else(|| "unscored".to_owned(), |s| format!("{s:.3}"));
    format!(
        "chose {} via {} (score {score}, cost {}); {alternative_count} alternative(s); strategy {strategy}",
        chosen.region, chosen.router_id, chosen.total_cost,
    )
}
