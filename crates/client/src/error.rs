use std::time::Duration;

use thiserror::Error;

use payrail_core::{ErrorCode, PaymentError};

/// Errors raised by the signed gateway client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request exceeded the configured timeout.
    #[error("gateway request timed out after {0:?}")]
    Timeout(Duration),

    /// Transport-level failure before a response was received.
    #[error("network error: {0}")]
    Network(String),

    /// The gateway answered with a non-2xx status.
    #[error("gateway returned {status}: {code} {message}")]
    Status {
        status: u16,
        code: ErrorCode,
        message: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode gateway response: {0}")]
    Decode(String),
}

impl ClientError {
    /// The taxonomy code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout(_) => ErrorCode::Timeout,
            Self::Network(_) => ErrorCode::NetworkError,
            Self::Status { code, .. } => *code,
            Self::Decode(_) => ErrorCode::GatewayError,
        }
    }

    /// Whether the fallback loop may retry after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }

    /// Convert into the engine-level error type.
    #[must_use]
    pub fn into_payment_error(self) -> PaymentError {
        let message = self.to_string();
        PaymentError::new(self.code(), message)
    }
}

impl From<ClientError> for PaymentError {
    fn from(err: ClientError) -> Self {
        err.into_payment_error()
    }
}

/// Map a gateway wire-level error code string to the taxonomy.
///
/// Unknown codes fall back to a status-derived mapping via
/// [`code_from_status`].
#[must_use]
pub fn code_from_wire(code: &str) -> Option<ErrorCode> {
    let mapped = match code {
        "REGION_NOT_FOUND" => ErrorCode::RegionNotFound,
        "PAYMENT_DECLINED" | "CARD_DECLINED" => ErrorCode::PaymentDeclined,
        "INSUFFICIENT_FUNDS" => ErrorCode::InsufficientFunds,
        "FRAUD_BLOCKED" => ErrorCode::FraudBlocked,
        "AUTHENTICATION_REQUIRED" => ErrorCode::AuthenticationRequired,
        "AUTHENTICATION_FAILED" => ErrorCode::AuthenticationFailed,
        "TIMEOUT" => ErrorCode::Timeout,
        "RATE_LIMITED" => ErrorCode::RateLimited,
        "SERVICE_UNAVAILABLE" => ErrorCode::ServiceUnavailable,
        "SANCTIONS_BLOCKED" => ErrorCode::SanctionsBlocked,
        "KYC_REQUIRED" => ErrorCode::KycRequired,
        "COMPLIANCE_REJECTED" => ErrorCode::ComplianceRejected,
        "INVALID_AMOUNT" => ErrorCode::InvalidAmount,
        "INVALID_CURRENCY" => ErrorCode::InvalidCurrency,
        "INVALID_TOKEN" => ErrorCode::InvalidToken,
        _ => return None,
    };
    Some(mapped)
}

/// Map an HTTP status to a taxonomy code when the body carries no usable
/// error code.
#[must_use]
pub fn code_from_status(status: u16) -> ErrorCode {
    match status {
        402 => ErrorCode::PaymentDeclined,
        401 | 403 => ErrorCode::AuthenticationFailed,
        408 => ErrorCode::Timeout,
        429 => ErrorCode::RateLimited,
        503 => ErrorCode::ServiceUnavailable,
        500 | 502 | 504 => ErrorCode::GatewayError,
        s if (400..500).contains(&s) => ErrorCode::InvalidIntent,
        _ => ErrorCode::GatewayError,
    }
}
