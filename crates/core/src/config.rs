use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, PaymentError};
use crate::quote::RegionQuote;
use crate::types::RegionCode;

/// Weights applied to the normalized metrics during scoring.
///
/// Each weight is non-negative; the built-in strategies use the canonical
/// vectors documented on [`RoutingStrategy`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Weight on normalized cost.
    pub price: f64,
    /// Weight on inverted normalized success rate.
    pub success: f64,
    /// Weight on normalized latency.
    pub latency: f64,
}

impl ScoreWeights {
    /// Price-only weights used by the `cheapest` strategy.
    pub const CHEAPEST: Self = Self { price: 1.0, success: 0.0, latency: 0.0 };
    /// Success-only weights used by the `highest_success` strategy.
    pub const HIGHEST_SUCCESS: Self = Self { price: 0.0, success: 1.0, latency: 0.0 };
    /// Balanced default weights.
    pub const BALANCED: Self = Self { price: 0.5, success: 0.3, latency: 0.2 };
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self::BALANCED
    }
}

/// A pluggable scorer replacing the built-in weighted scoring wholesale.
///
/// Implementations receive the filtered quote set and must return the same
/// quotes re-ordered best-first, with `score`/`reasons` filled in as they
/// see fit.
pub trait QuoteScorer: Send + Sync {
    /// Re-order the quotes best-first.
    fn score(&self, quotes: Vec<RegionQuote>, weights: &ScoreWeights) -> Vec<RegionQuote>;

    /// Name used in decision summaries.
    fn name(&self) -> &str {
        "custom"
    }
}

/// Routing strategy selecting how ranked quotes are produced.
#[derive(Clone)]
pub enum RoutingStrategy {
    /// Weighted scoring with [`ScoreWeights::CHEAPEST`].
    Cheapest,
    /// Weighted scoring with [`ScoreWeights::HIGHEST_SUCCESS`].
    HighestSuccess,
    /// Weighted scoring with the configured weights.
    Balanced,
    /// Caller-supplied scorer replacing the built-in scoring wholesale.
    Custom(Arc<dyn QuoteScorer>),
}

impl RoutingStrategy {
    /// Strategy name used in decision summaries.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Cheapest => "cheapest",
            Self::HighestSuccess => "highest_success",
            Self::Balanced => "balanced",
            Self::Custom(scorer) => scorer.name(),
        }
    }
}

impl std::fmt::Debug for RoutingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for RoutingStrategy {
    fn default() -> Self {
        Self::Balanced
    }
}

/// Mode of the strategy decider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoutingMode {
    /// Filter, score, and take the top-ranked quote.
    #[default]
    Auto,
    /// Choose the pinned region unconditionally when it has an available
    /// quote; otherwise fall through to auto.
    Pinned(RegionCode),
    /// Compute the decision exactly as auto, but the executor must refuse to
    /// execute a real payment.
    DryRun,
}

/// Fallback behaviour of the payment executor.
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// Whether fallback to alternative regions is enabled.
    pub enabled: bool,
    /// Upper bound on total attempts (including the first).
    pub max_tries: u32,
    /// Base backoff between attempts; scaled linearly by attempt number.
    pub backoff: Duration,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_tries: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

/// Configuration of the routing pipeline.
#[derive(Debug, Clone, Default)]
pub struct RoutingConfig {
    /// Decision mode.
    pub mode: RoutingMode,
    /// Scoring strategy.
    pub strategy: RoutingStrategy,
    /// Weights for the `Balanced` strategy (built-ins override these).
    pub weights: ScoreWeights,
    /// When non-empty, only these regions are eligible.
    pub allowed_regions: Vec<RegionCode>,
    /// Regions that are never eligible.
    pub blocked_regions: Vec<RegionCode>,
    /// Fallback behaviour.
    pub fallback: FallbackConfig,
    /// TTL for cached quote results. `None` uses the cache default.
    pub quote_ttl: Option<Duration>,
}

impl RoutingConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.fallback.max_tries < 1 {
            return Err(PaymentError::new(
                ErrorCode::InvalidIntent,
                "fallback.max_tries must be >= 1",
            ));
        }
        for w in [self.weights.price, self.weights.success, self.weights.latency] {
            if !w.is_finite() || w < 0.0 {
                return Err(PaymentError::new(
                    ErrorCode::InvalidIntent,
                    "score weights must be finite and non-negative",
                ));
            }
        }
        Ok(())
    }
}

/// Compliance gates applied during filtering.
#[derive(Debug, Clone, Default)]
pub struct ComplianceConfig {
    /// Regions under sanctions; always filtered.
    pub sanctioned_regions: Vec<RegionCode>,
    /// Countries the merchant may not transact with.
    pub blocked_countries: Vec<String>,
}
