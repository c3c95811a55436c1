use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{IntentId, PaymentMethod, RegionCode, RouterId};

/// Fee components making up a region's quoted cost.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeBreakdown {
    /// Percentage-based fee, already applied to the amount.
    pub percent: Decimal,
    /// Fixed per-transaction fee.
    pub fixed: Decimal,
    /// Foreign-exchange markup, if any.
    #[serde(default)]
    pub fx: Decimal,
    /// Network/scheme fee.
    #[serde(default)]
    pub network: Decimal,
    /// Cross-border surcharge.
    #[serde(default)]
    pub cross_border: Decimal,
}

impl FeeBreakdown {
    /// Sum of all fee components.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.percent + self.fixed + self.fx + self.network + self.cross_border
    }
}

/// Amount limits enforced by a region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionLimits {
    /// Minimum acceptable amount.
    pub min: Decimal,
    /// Maximum acceptable amount.
    pub max: Decimal,
    /// Remaining daily volume, when the region enforces a daily cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_daily: Option<Decimal>,
}

/// A candidate route: one region's priced offer for a payment intent.
///
/// `score` and `reasons` are written only by the scoring engine; downstream
/// of scoring the quote is read-only. A score is only meaningful relative to
/// quotes scored together in the same scoring call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionQuote {
    /// Region offering the route.
    pub region: RegionCode,
    /// Router that would carry the payment.
    pub router_id: RouterId,
    /// Total cost of routing through this region.
    pub total_cost: Decimal,
    /// Component breakdown of `total_cost`.
    pub fees: FeeBreakdown,
    /// Limits the region enforces.
    pub limits: RegionLimits,
    /// Historical success rate in `[0, 1]`, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<f64>,
    /// Median gateway latency in milliseconds, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    /// Whether the region can currently take traffic.
    pub available: bool,
    /// Reason the region is unavailable, when `available` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unavailable_reason: Option<String>,
    /// Payment methods this region supports. Empty means all methods.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_methods: Vec<PaymentMethod>,
    /// Score assigned by the scoring engine (lower is better).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Human-readable scoring reasons.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

/// Result of a quote call: the ordered candidate set for one intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResult {
    /// The intent the quotes were produced for.
    pub intent_id: IntentId,
    /// Candidate quotes, ranked best-first once scored.
    pub quotes: Vec<RegionQuote>,
    /// The best quote, when at least one candidate survived filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best: Option<RegionQuote>,
    /// Whether this result was served from the quote cache.
    pub cache_hit: bool,
    /// When the quotes were generated.
    pub generated_at: DateTime<Utc>,
    /// Non-fatal observations gathered while quoting (filtered regions,
    /// missing metrics, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Static description of a region, as reported by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionInfo {
    /// Region code.
    pub region: RegionCode,
    /// Display name.
    pub name: String,
    /// Currencies the region settles in.
    pub currencies: Vec<String>,
    /// Payment methods the region supports.
    pub methods: Vec<PaymentMethod>,
    /// Whether the region is taking traffic.
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fee_total_sums_all_components() {
        let fees = FeeBreakdown {
            percent: dec!(0.50),
            fixed: dec!(0.25),
            fx: dec!(0.10),
            network: dec!(0.05),
            cross_border: dec!(0.15),
        };
        assert_eq!(fees.total(), dec!(1.05));
    }

    #[test]
    fn fee_default_is_zero() {
        assert_eq!(FeeBreakdown::default().total(), Decimal::ZERO);
    }

    #[test]
    fn quote_serde_roundtrip() {
        let quote = RegionQuote {
            region: "EU".into(),
            router_id: "rtr-eu-1".into(),
            total_cost: dec!(1.20),
            fees: FeeBreakdown::default(),
            limits: RegionLimits {
                min: dec!(0.50),
                max: dec!(10000),
                remaining_daily: Some(dec!(2500)),
            },
            success_rate: Some(0.97),
            latency_ms: Some(120.0),
            available: true,
            unavailable_reason: None,
            supported_methods: vec![],
            score: None,
            reasons: vec![],
        };
        let json = serde_json::to_string(&quote).unwrap();
        // Unset optional fields are omitted from the wire form.
        assert!(!json.contains("unavailable_reason"));
        assert!(!json.contains("score"));
        let back: RegionQuote = serde_json::from_str(&json).unwrap();
        assert_eq!(back.region.as_str(), "EU");
        assert_eq!(back.limits.remaining_daily, Some(dec!(2500)));
    }
}
