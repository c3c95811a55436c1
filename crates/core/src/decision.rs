use serde::{Deserialize, Serialize};

use crate::quote::{QuoteResult, RegionQuote};
use crate::types::{RegionCode, RouterId};

/// A routing decision: the chosen region plus the ordered fallback list.
///
/// Consumed exactly once by the payment executor. Alternatives are ranked
/// best-first; the executor walks them in order when the chosen region fails
/// with a retryable error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    /// Chosen region.
    pub region: RegionCode,
    /// Router serving the chosen region.
    pub router_id: RouterId,
    /// Ranked alternatives for fallback, best-first.
    pub alternatives: Vec<RegionQuote>,
    /// Deterministic human-readable summary, derived solely from the
    /// decision's own fields.
    pub reason: String,
    /// Name of the strategy that produced the decision.
    pub strategy: String,
    /// The quote result the decision was derived from.
    pub quote_result: QuoteResult,
}

impl RouteDecision {
    /// The quote backing the chosen region, when present in the quote set.
    #[must_use]
    pub fn chosen_quote(&self) -> Option<&RegionQuote> {
        self.quote_result
            .quotes
            .iter()
            .find(|q| q.region == self.region)
    }
}
