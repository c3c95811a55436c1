use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::outcome::PaymentAttempt;

/// Broad grouping of error codes, used for propagation policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Routing,
    Payment,
    Network,
    Validation,
    Compliance,
    Idempotency,
}

/// Error taxonomy for the routing engine.
///
/// Retryability is a property of the code, not of the call site: network and
/// system-level failures drive the fallback loop, everything else aborts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Routing
    RegionNotFound,
    RegionNotAllowed,
    NoAvailableRegions,
    // Payment (terminal decisions by the processor)
    PaymentDeclined,
    InsufficientFunds,
    FraudBlocked,
    AuthenticationRequired,
    AuthenticationFailed,
    // Network / system
    Timeout,
    NetworkError,
    ServiceUnavailable,
    RateLimited,
    InternalError,
    GatewayError,
    // Validation
    InvalidIntent,
    MissingField,
    InvalidAmount,
    InvalidCurrency,
    InvalidToken,
    // Compliance
    SanctionsBlocked,
    KycRequired,
    ComplianceRejected,
    // Idempotency
    IdempotencyConflict,
    IdempotencyInProgress,
    // Circuit breaker short-circuit
    CircuitOpen,
    // Dry-run reporting marker
    DryRunComplete,
}

impl ErrorCode {
    /// Return the wire-level code string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RegionNotFound => "REGION_NOT_FOUND",
            Self::RegionNotAllowed => "REGION_NOT_ALLOWED",
            Self::NoAvailableRegions => "NO_AVAILABLE_REGIONS",
            Self::PaymentDeclined => "PAYMENT_DECLINED",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::FraudBlocked => "FRAUD_BLOCKED",
            Self::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::Timeout => "TIMEOUT",
            Self::NetworkError => "NETWORK_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::RateLimited => "RATE_LIMITED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::GatewayError => "GATEWAY_ERROR",
            Self::InvalidIntent => "INVALID_INTENT",
            Self::MissingField => "MISSING_FIELD",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::InvalidCurrency => "INVALID_CURRENCY",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::SanctionsBlocked => "SANCTIONS_BLOCKED",
            Self::KycRequired => "KYC_REQUIRED",
            Self::ComplianceRejected => "COMPLIANCE_REJECTED",
            Self::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            Self::IdempotencyInProgress => "IDEMPOTENCY_IN_PROGRESS",
            Self::CircuitOpen => "CIRCUIT_OPEN",
            Self::DryRunComplete => "DRY_RUN_COMPLETE",
        }
    }

    /// The category this code belongs to.
    #[must_use]
    pub fn category(self) -> ErrorCategory {
        match self {
            Self::RegionNotFound | Self::RegionNotAllowed | Self::NoAvailableRegions => {
                ErrorCategory::Routing
            }
            Self::PaymentDeclined
            | Self::InsufficientFunds
            | Self::FraudBlocked
            | Self::AuthenticationRequired
            | Self::AuthenticationFailed => ErrorCategory::Payment,
            Self::Timeout
            | Self::NetworkError
            | Self::ServiceUnavailable
            | Self::RateLimited
            | Self::InternalError
            | Self::GatewayError
            | Self::CircuitOpen => ErrorCategory::Network,
            Self::InvalidIntent
            | Self::MissingField
            | Self::InvalidAmount
            | Self::InvalidCurrency
            | Self::InvalidToken
            | Self::DryRunComplete => ErrorCategory::Validation,
            Self::SanctionsBlocked | Self::KycRequired | Self::ComplianceRejected => {
                ErrorCategory::Compliance
            }
            Self::IdempotencyConflict | Self::IdempotencyInProgress => ErrorCategory::Idempotency,
        }
    }

    /// Whether the fallback loop may retry through an alternative region
    /// after seeing this code.
    ///
    /// `CircuitOpen` is deliberately non-retryable: the breaker guards the
    /// gateway dependency itself, so every alternative region would
    /// short-circuit against the same open circuit.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::NetworkError
                | Self::ServiceUnavailable
                | Self::RateLimited
                | Self::InternalError
                | Self::GatewayError
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable error detail attached to attempts and user-visible results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Error code from the taxonomy.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Whether the error is retryable.
    pub retryable: bool,
}

impl ErrorDetail {
    /// Build a detail record from a code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.is_retryable(),
        }
    }
}

/// Top-level error type for the payrail engine.
///
/// Carries the attempts log when a payment failed after one or more gateway
/// calls, so callers can show which regions were tried.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct PaymentError {
    /// Error code from the taxonomy.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Attempts made before the failure, in order. Empty when the error was
    /// raised before any gateway call (e.g. validation).
    pub attempts: Vec<PaymentAttempt>,
}

impl PaymentError {
    /// Create an error with no attempts log.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            attempts: Vec::new(),
        }
    }

    /// Attach an attempts log to the error.
    #[must_use]
    pub fn with_attempts(mut self, attempts: Vec<PaymentAttempt>) -> Self {
        self.attempts = attempts;
        self
    }

    /// Whether the fallback loop may retry after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// The category of the underlying code.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Convert into the serializable detail form (drops the attempts log).
    #[must_use]
    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail::new(self.code, self.message.clone())
    }
}
