use thiserror::Error;

use payrail_client::ClientError;
use payrail_core::{ErrorCode, PaymentError, RouteDecision};

/// Error surface of the routing engine facade.
///
/// Almost everything flows through [`PaymentError`]; the one structured
/// variant is `DryRun`, which carries the full decision so callers can
/// inspect what *would* have happened without treating it as a failure
/// of the pipeline itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A payment-domain error, with the attempts log when gateway calls
    /// were made.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// The engine is in dry-run mode: the decision was computed but no
    /// payment was executed.
    #[error("dry run complete: {}", .decision.reason)]
    DryRun {
        /// The decision that would have been executed.
        decision: Box<RouteDecision>,
    },
}

impl EngineError {
    /// The taxonomy code behind this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Payment(err) => err.code,
            Self::DryRun { .. } => ErrorCode::DryRunComplete,
        }
    }

    /// Whether retrying the whole operation could help.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Payment(err) => err.is_retryable(),
            Self::DryRun { .. } => false,
        }
    }
}

impl From<ClientError> for EngineError {
    fn from(err: ClientError) -> Self {
        Self::Payment(err.into())
    }
}
