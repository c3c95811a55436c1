use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ErrorDetail;
use crate::types::{IntentId, RegionCode, RouterId};

/// Outcome of a single payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed,
}

/// One entry in the attempts log of a `pay()` call.
///
/// Immutable once recorded. Attempts within one call are strictly
/// sequential; the attempt number is 1-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Region tried.
    pub region: RegionCode,
    /// Router tried.
    pub router_id: RouterId,
    /// Outcome of the attempt.
    pub outcome: AttemptOutcome,
    /// Error detail when the attempt failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the attempt in milliseconds.
    pub duration_ms: u64,
}

/// Final status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Succeeded,
    Failed,
    Pending,
    RequiresAction,
}

/// Terminal object returned to the caller of `pay()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    /// The intent this result settles.
    pub intent_id: IntentId,
    /// Final outcome.
    pub status: PaymentStatus,
    /// Region the payment actually went through.
    pub region_used: RegionCode,
    /// Router the payment actually went through.
    pub router_used: RouterId,
    /// Amount charged.
    pub amount: Decimal,
    /// Settlement currency.
    pub currency: String,
    /// Provider-side reference for the payment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_reference: Option<String>,
    /// Ordered log of every attempt made, including failures.
    pub attempts: Vec<PaymentAttempt>,
    /// Idempotency key the payment was executed under.
    pub idempotency_key: String,
}

/// Terminal object returned to the caller of `refund()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResult {
    /// The refund intent this result settles.
    pub refund_id: IntentId,
    /// Final outcome.
    pub status: PaymentStatus,
    /// Region the refund was executed in.
    pub region: RegionCode,
    /// Amount refunded.
    pub amount: Decimal,
    /// Settlement currency.
    pub currency: String,
    /// Provider-side reference for the refund.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_reference: Option<String>,
    /// Idempotency key the refund was executed under.
    pub idempotency_key: String,
}
