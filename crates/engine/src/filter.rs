//! Quote filtering: hard eligibility gates applied before scoring.
//!
//! Gates run in a fixed order per quote and the first failing gate wins, so
//! a quote is dropped for exactly one reason. Filtering is pure: it never
//! mutates quotes, it only partitions them.

use serde::Serialize;

use payrail_core::{ComplianceConfig, PaymentIntent, RegionQuote, RoutingConfig};

/// Why a quote was removed from the candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterReason {
    RegionUnavailable,
    RegionNotAllowed,
    RegionBlocked,
    AmountBelowMin,
    AmountAboveMax,
    DailyLimitExceeded,
    MethodNotSupported,
}

impl FilterReason {
    /// Stable string form used in warnings and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RegionUnavailable => "region_unavailable",
            Self::RegionNotAllowed => "region_not_allowed",
            Self::RegionBlocked => "region_blocked",
            Self::AmountBelowMin => "amount_below_min",
            Self::AmountAboveMax => "amount_above_max",
            Self::DailyLimitExceeded => "daily_limit_exceeded",
            Self::MethodNotSupported => "method_not_supported",
        }
    }
}

impl std::fmt::Display for FilterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A quote that failed a gate, paired with the gate that removed it.
#[derive(Debug, Clone)]
pub struct FilteredQuote {
    /// The rejected quote, unmodified.
    pub quote: RegionQuote,
    /// The first gate that failed.
    pub reason: FilterReason,
}

/// Partition of a quote set into survivors and rejects.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Quotes that passed every gate, in their input order.
    pub passed: Vec<RegionQuote>,
    /// Quotes removed, each with the reason that removed it.
    pub filtered: Vec<FilteredQuote>,
}

/// Apply every eligibility gate to each quote.
///
/// Gate order is part of the contract: availability, allow-list, block-list
/// (including sanctioned regions), amount bounds, daily cap, then method
/// support. The same input always yields the same partition.
#[must_use]
pub fn filter_quotes(
    quotes: Vec<RegionQuote>,
    intent: &PaymentIntent,
    routing: &RoutingConfig,
    compliance: &ComplianceConfig,
) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();
    for quote in quotes {
        match gate(&quote, intent, routing, compliance) {
            None => outcome.passed.push(quote),
            Some(reason) => outcome.filtered.push(FilteredQuote { quote, reason }),
        }
    }
    outcome
}

/// Run the gates in order and return the first failure, if any.
fn gate(
    quote: &RegionQuote,
    intent: &PaymentIntent,
    routing: &RoutingConfig,
    compliance: &ComplianceConfig,
) -> Option<FilterReason> {
    if !quote.available {
        return Some(FilterReason::RegionUnavailable);
    }
    if !routing.allowed_regions.is_empty() && !routing.allowed_regions.contains(&quote.region) {
        return Some(FilterReason::RegionNotAllowed);
    }
    if routing.blocked_regions.contains(&quote.region)
        || compliance.sanctioned_regions.contains(&quote.region)
    {
        return Some(FilterReason::RegionBlocked);
    }
    if intent.amount < quote.limits.min {
        return Some(FilterReason::AmountBelowMin);
    }
    if intent.amount > quote.limits.max {
        return Some(FilterReason::AmountAboveMax);
    }
    if let Some(remaining) = quote.limits.remaining_daily
        && intent.amount > remaining
    {
        return Some(FilterReason::DailyLimitExceeded);
    }
    if !quote.supported_methods.is_empty() && !quote.supported_methods.contains(&intent.method) {
        return Some(FilterReason::MethodNotSupported);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use payrail_core::{FeeBreakdown, PaymentMethod, RegionLimits};
    use rust_decimal_macros::dec;

    fn quote(region: &str) -> RegionQuote {
        RegionQuote {
            region: region.into(),
            router_id: format!("rtr-{}-1", region.to_lowercase()).into(),
            total_cost: dec!(1.00),
            fees: FeeBreakdown::default(),
            limits: RegionLimits {
                min: dec!(1.00),
                max: dec!(10000),
                remaining_daily: None,
            },
            success_rate: Some(0.95),
            latency_ms: Some(100.0),
            available: true,
            unavailable_reason: None,
            supported_methods: vec![],
            score: None,
            reasons: vec![],
        }
    }

    fn intent() -> PaymentIntent {
        PaymentIntent::new("pi-1", dec!(50.00), "EUR", PaymentMethod::BankTransfer)
    }

    fn run(quotes: Vec<RegionQuote>, routing: &RoutingConfig) -> FilterOutcome {
        filter_quotes(quotes, &intent(), routing, &ComplianceConfig::default())
    }

    #[test]
    fn clean_quote_passes_all_gates() {
        let outcome = run(vec![quote("EU")], &RoutingConfig::default());
        assert_eq!(outcome.passed.len(), 1);
        assert!(outcome.filtered.is_empty());
    }

    #[test]
    fn unavailable_region_filtered() {
        let mut q = quote("EU");
        q.available = false;
        q.unavailable_reason = Some("maintenance".into());
        let outcome = run(vec![q], &RoutingConfig::default());
        assert_eq!(outcome.filtered[0].reason, FilterReason::RegionUnavailable);
    }

    #[test]
    fn allow_list_excludes_other_regions() {
        let routing = RoutingConfig {
            allowed_regions: vec!["EU".into()],
            ..RoutingConfig::default()
        };
        let outcome = run(vec![quote("EU"), quote("US")], &routing);
        assert_eq!(outcome.passed.len(), 1);
        assert_eq!(outcome.passed[0].region.as_str(), "EU");
        assert_eq!(outcome.filtered[0].reason, FilterReason::RegionNotAllowed);
    }

    #[test]
    fn empty_allow_list_admits_everything() {
        let outcome = run(vec![quote("EU"), quote("US")], &RoutingConfig::default());
        assert_eq!(outcome.passed.len(), 2);
    }

    #[test]
    fn block_list_wins_over_amount_gates() {
        let routing = RoutingConfig {
            blocked_regions: vec!["US".into()],
            ..RoutingConfig::default()
        };
        let mut q = quote("US");
        q.limits.min = dec!(100.00); // would also fail the amount gate
        let outcome = run(vec![q], &routing);
        assert_eq!(outcome.filtered[0].reason, FilterReason::RegionBlocked);
    }

    #[test]
    fn sanctioned_region_filtered_as_blocked() {
        let compliance = ComplianceConfig {
            sanctioned_regions: vec!["XX".into()],
            ..ComplianceConfig::default()
        };
        let outcome = filter_quotes(
            vec![quote("XX")],
            &intent(),
            &RoutingConfig::default(),
            &compliance,
        );
        assert_eq!(outcome.filtered[0].reason, FilterReason::RegionBlocked);
    }

    #[test]
    fn amount_below_min_filtered() {
        let mut q = quote("EU");
        q.limits.min = dec!(100.00);
        let outcome = run(vec![q], &RoutingConfig::default());
        assert_eq!(outcome.filtered[0].reason, FilterReason::AmountBelowMin);
    }

    #[test]
    fn amount_above_max_filtered() {
        let mut q = quote("EU");
        q.limits.max = dec!(10.00);
        let outcome = run(vec![q], &RoutingConfig::default());
        assert_eq!(outcome.filtered[0].reason, FilterReason::AmountAboveMax);
    }

    #[test]
    fn amount_at_limits_passes() {
        let mut q = quote("EU");
        q.limits.min = dec!(50.00);
        q.limits.max = dec!(50.00);
        let outcome = run(vec![q], &RoutingConfig::default());
        assert_eq!(outcome.passed.len(), 1);
    }

    #[test]
    fn daily_limit_exhaustion_filtered() {
        let mut q = quote("EU");
        q.limits.remaining_daily = Some(dec!(49.99));
        let outcome = run(vec![q], &RoutingConfig::default());
        assert_eq!(outcome.filtered[0].reason, FilterReason::DailyLimitExceeded);
    }

    #[test]
    fn daily_limit_exactly_sufficient_passes() {
        let mut q = quote("EU");
        q.limits.remaining_daily = Some(dec!(50.00));
        let outcome = run(vec![q], &RoutingConfig::default());
        assert_eq!(outcome.passed.len(), 1);
    }

    #[test]
    fn unsupported_method_filtered() {
        let mut q = quote("EU");
        q.supported_methods = vec![PaymentMethod::Card];
        let outcome = run(vec![q], &RoutingConfig::default());
        assert_eq!(outcome.filtered[0].reason, FilterReason::MethodNotSupported);
    }

    #[test]
    fn empty_supported_methods_means_all() {
        let outcome = run(vec![quote("EU")], &RoutingConfig::default());
        assert_eq!(outcome.passed.len(), 1);
    }

    #[test]
    fn first_failing_gate_wins() {
        // Unavailable AND blocked AND over max: availability is checked first.
        let routing = RoutingConfig {
            blocked_regions: vec!["EU".into()],
            ..RoutingConfig::default()
        };
        let mut q = quote("EU");
        q.available = false;
        q.limits.max = dec!(1.00);
        let outcome = run(vec![q], &routing);
        assert_eq!(outcome.filtered[0].reason, FilterReason::RegionUnavailable);
    }

    #[test]
    fn input_order_preserved() {
        let outcome = run(vec![quote("A"), quote("B"), quote("C")], &RoutingConfig::default());
        let regions: Vec<_> = outcome.passed.iter().map(|q| q.region.as_str()).collect();
        assert_eq!(regions, ["A", "B", "C"]);
    }
}
