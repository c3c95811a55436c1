//! Weighted quote scoring.
//!
//! Every surviving quote gets a score in `[0, 1]` where lower is better:
//! a weighted sum of min/max-normalized cost, inverted success rate, and
//! latency, plus flat penalties for daily-limit pressure, weak success
//! rates, and slow gateways. Missing metrics fall back to neutral defaults
//! rather than excluding the quote.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use payrail_core::{QuoteScorer, RegionQuote, RoutingStrategy, ScoreWeights};

/// Success rate assumed for quotes that do not report one.
pub const DEFAULT_SUCCESS_RATE: f64 = 0.9;

/// Latency assumed for quotes that do not report one, in milliseconds.
pub const DEFAULT_LATENCY_MS: f64 = 100.0;

/// Success rate below which the weak-success penalty applies.
const SUCCESS_PENALTY_FLOOR: f64 = 0.8;

/// Latency above which the flat slow-gateway penalty applies.
const LATENCY_PENALTY_CEILING_MS: f64 = 500.0;

/// Daily-limit consumption ratio above which pressure is penalized.
const DAILY_PRESSURE_FLOOR: f64 = 0.8;

/// Rank quotes best-first under the given strategy.
///
/// Built-in strategies substitute their canonical weight vectors; `Custom`
/// hands the whole set to the caller's scorer untouched. `amount` is the
/// intent amount, used only for the daily-limit pressure penalty.
#[must_use]
pub fn rank(
    quotes: Vec<RegionQuote>,
    strategy: &RoutingStrategy,
    weights: &ScoreWeights,
    amount: Option<Decimal>,
) -> Vec<RegionQuote> {
    match strategy {
        RoutingStrategy::Cheapest => score_quotes(quotes, &ScoreWeights::CHEAPEST, amount),
        RoutingStrategy::HighestSuccess => {
            score_quotes(quotes, &ScoreWeights::HIGHEST_SUCCESS, amount)
        }
        RoutingStrategy::Balanced => score_quotes(quotes, weights, amount),
        RoutingStrategy::Custom(scorer) => scorer.score(quotes, weights),
    }
}

/// Score and sort quotes ascending (lower score routes first).
///
/// Normalization is relative to the set being scored: when every quote
/// shares a metric value, that metric contributes zero for all of them.
#[must_use]
pub fn score_quotes(
    mut quotes: Vec<RegionQuote>,
    weights: &ScoreWeights,
    amount: Option<Decimal>,
) -> Vec<RegionQuote> {
    if quotes.is_empty() {
        return quotes;
    }

    let costs: Vec<f64> = quotes
        .iter()
        .map(|q| q.total_cost.to_f64().unwrap_or(0.0))
        .collect();
    let successes: Vec<f64> = quotes
        .iter()
        .map(|q| q.success_rate.unwrap_or(DEFAULT_SUCCESS_RATE))
        .collect();
    let latencies: Vec<f64> = quotes
        .iter()
        .map(|q| q.latency_ms.unwrap_or(DEFAULT_LATENCY_MS))
        .collect();

    let cost_bounds = bounds(&costs);
    let success_bounds = bounds(&successes);
    let latency_bounds = bounds(&latencies);

    for (i, quote) in quotes.iter_mut().enumerate() {
        let norm_cost = normalize(costs[i], cost_bounds);
        // Higher success is better, so its normalization is inverted.
        let norm_success = normalize_inverted(successes[i], success_bounds);
        let norm_latency = normalize(latencies[i], latency_bounds);

        let mut score = weights.price * norm_cost
            + weights.success * norm_success
            + weights.latency * norm_latency;

        let mut reasons = vec![
            format!("cost {:.4} normalized {norm_cost:.3}", costs[i]),
            format!("success rate {:.2} normalized {norm_success:.3}", successes[i]),
            format!("latency {:.0}ms normalized {norm_latency:.3}", latencies[i]),
        ];

        if let Some(penalty) = daily_pressure_penalty(amount, quote.limits.remaining_daily) {
            score += penalty;
            reasons.push(format!("daily limit pressure +{penalty:.3}"));
        }
        if successes[i] < SUCCESS_PENALTY_FLOOR {
            let penalty = (SUCCESS_PENALTY_FLOOR - successes[i]) * 0.2;
            score += penalty;
            reasons.push(format!("weak success rate +{penalty:.3}"));
        }
        if latencies[i] > LATENCY_PENALTY_CEILING_MS {
            score += 0.05;
            reasons.push("slow gateway +0.050".to_owned());
        }

        quote.score = Some(score.clamp(0.0, 1.0));
        quote.reasons = reasons;
    }

    quotes.sort_by(|a, b| {
        a.score
            .unwrap_or(f64::MAX)
            .total_cmp(&b.score.unwrap_or(f64::MAX))
    });
    quotes
}

/// Penalty for a payment that consumes most of a region's remaining daily
/// volume: ramps linearly from 0 at 80% consumption to 0.1 at 100%.
fn daily_pressure_penalty(amount: Option<Decimal>, remaining: Option<Decimal>) -> Option<f64> {
    let amount = amount?;
    let remaining = remaining?;
    if remaining <= Decimal::ZERO {
        return None;
    }
    let ratio = (amount / remaining).to_f64()?;
    if ratio > DAILY_PRESSURE_FLOOR {
        Some(0.1 * (ratio.min(1.0) - DAILY_PRESSURE_FLOOR) * 5.0)
    } else {
        None
    }
}

fn bounds(values: &[f64]) -> (f64, f64) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (min, max)
}

/// Min/max normalization; a degenerate range normalizes to zero so the
/// metric drops out of the comparison entirely.
fn normalize(value: f64, (min, max): (f64, f64)) -> f64 {
    if max <= min {
        0.0
    } else {
        (value - min) / (max - min)
    }
}

/// Inverted normalization for higher-is-better metrics. Degenerate ranges
/// also normalize to zero here, never to one.
fn normalize_inverted(value: f64, (min, max): (f64, f64)) -> f64 {
    if max <= min {
        0.0
    } else {
        (max - value) / (max - min)
    }
}
