//! Core types and shared abstractions for the payrail routing engine.
//!
//! This crate is deliberately free of I/O and async code: it defines the
//! domain model (intents, quotes, decisions, attempts, results), the error
//! taxonomy with its retryability rules, routing configuration, and the
//! fingerprint helpers used by the quote cache and idempotency guard.

pub mod config;
pub mod decision;
pub mod error;
pub mod fingerprint;
pub mod intent;
pub mod outcome;
pub mod quote;
pub mod types;

pub use config::{
    ComplianceConfig, FallbackConfig, QuoteScorer, RoutingConfig, RoutingMode, RoutingStrategy,
    ScoreWeights,
};
pub use decision::RouteDecision;
pub use error::{ErrorCategory, ErrorCode, ErrorDetail, PaymentError};
pub use fingerprint::{quote_fingerprint, request_hash};
pub use intent::{PaymentIntent, RefundIntent};
pub use outcome::{AttemptOutcome, PaymentAttempt, PaymentResult, PaymentStatus, RefundResult};
pub use quote::{FeeBreakdown, QuoteResult, RegionInfo, RegionLimits, RegionQuote};
pub use types::{IntentId, PaymentMethod, RegionCode, RouterId};
